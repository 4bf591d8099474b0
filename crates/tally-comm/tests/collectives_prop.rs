//! Property tests for the rank-0 collectives on thread worlds of varying
//! size.

use proptest::prelude::*;
use tally_comm::{broadcast, gather, run_spmd, scatter};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn broadcast_replaces_every_rank_with_root(
        size in 1usize..6,
        root_value in any::<i64>(),
    ) {
        let results = run_spmd(size, |comm| {
            let mut v = if comm.rank() == 0 { root_value } else { -(comm.rank() as i64) };
            broadcast(comm.as_ref(), &mut v).unwrap();
            v
        })
        .unwrap();
        prop_assert_eq!(results, vec![root_value; size]);
    }

    #[test]
    fn scatter_then_gather_restores_root_input(
        input in prop::collection::vec(any::<u32>(), 1..6),
    ) {
        let size = input.len();
        let results = run_spmd(size, |comm| {
            let mine = if comm.rank() == 0 { input.clone() } else { Vec::new() };
            let mut local = 0u32;
            scatter(comm.as_ref(), mine, &mut local).unwrap();
            let mut all = Vec::new();
            gather(comm.as_ref(), local, &mut all).unwrap();
            (local, all)
        })
        .unwrap();
        for (rank, (local, _)) in results.iter().enumerate() {
            prop_assert_eq!(*local, input[rank]);
        }
        prop_assert_eq!(&results[0].1, &input);
    }
}
