use cordyceps_avl::AvlMap;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut map: AvlMap<u32, char> = AvlMap::new();

    for (key, value) in [(2, 'b'), (0, 'z'), (3, 'c'), (4, 'd'), (5, 'e'), (1, 'a'), (6, 'f')] {
        match map.insert(key, value) {
            Ok(acts) => println!(
                "insert {key}: {acts} rebalancing acts, height {}",
                map.height()
            ),
            Err(e) => println!("insert {key}: {e}"),
        }
        map.assert_invariants();
    }

    if let Err(e) = map.insert(4, 'x') {
        println!("insert 4 again: {e}");
    }

    println!("{:?}", map.iter().map(|(k, _)| *k).collect::<Vec<_>>());
    println!("rank(4) = {}, select(4) = {:?}", map.rank(&4), map.select(4));

    let (mut less, (key, value), greater) = match map.split(&3) {
        Ok(parts) => parts,
        Err(e) => {
            println!("split 3: {e}");
            return;
        }
    };
    println!("split at {key}: {less:?} | {greater:?}");

    match less.join(greater, key, value) {
        Ok(cost) => println!("join cost {cost}: {less:?}"),
        Err(e) => println!("join: {e}"),
    }
    less.assert_invariants();

    match less.delete(&0) {
        Ok((key, value, acts)) => println!("delete {key} ({value}): {acts} rebalancing acts"),
        Err(e) => println!("delete 0: {e}"),
    }
    less.assert_invariants();

    println!("{:?}", less.to_ordered_sequence().map(|(k, _)| *k).collect::<Vec<_>>());
}
