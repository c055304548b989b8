use gambit_engine::pot::{order_from_dealer, split_pot, Contribution, Pot, PotManager};

#[test]
fn equal_stacks_no_side_pot() {
    let pm = PotManager::from_contributions(&[(0, 1000), (1, 1000)]);
    assert_eq!(pm.main_pot().map(|p| p.amount), Some(2000));
    assert!(pm.side_pots().is_empty());
}

#[test]
fn heads_up_uneven_all_in_returns_excess_in_own_pot() {
    let pm = PotManager::from_contributions(&[(0, 500), (1, 1000)]);
    assert_eq!(pm.main_pot().map(|p| p.amount), Some(1000));
    assert_eq!(
        pm.side_pots(),
        &[Pot {
            amount: 500,
            eligible: vec![1]
        }]
    );
}

#[test]
fn three_way_side_pots_sum_to_total_wagered() {
    let pm = PotManager::from_contributions(&[(0, 200), (1, 50), (2, 30)]);
    let amounts: Vec<u32> = pm.pots().iter().map(|p| p.amount).collect();
    assert_eq!(amounts, vec![90, 40, 150]);
    assert_eq!(pm.total(), 280);
    assert_eq!(pm.pots()[1].eligible, vec![0, 1]);
}

#[test]
fn folding_after_contributing_loses_eligibility_only() {
    let pm = PotManager::from_entries(&[
        Contribution { seat: 0, amount: 30, folded: false },
        Contribution { seat: 1, amount: 80, folded: true },
        Contribution { seat: 2, amount: 100, folded: false },
        Contribution { seat: 3, amount: 100, folded: false },
    ]);
    assert_eq!(pm.total(), 310);
    let pots = pm.pots();
    assert_eq!(pots.len(), 2);
    assert_eq!(pots[0], Pot { amount: 120, eligible: vec![0, 2, 3] });
    assert_eq!(pots[1], Pot { amount: 190, eligible: vec![2, 3] });
}

#[test]
fn odd_chips_are_never_lost() {
    for amount in [1u32, 7, 100, 101, 1001] {
        let mut winners = vec![0, 3, 5];
        order_from_dealer(&mut winners, 4, 10);
        assert_eq!(winners, vec![5, 0, 3]);
        let shares = split_pot(amount, &winners);
        let total: u32 = shares.iter().map(|(_, a)| a).sum();
        assert_eq!(total, amount);
        assert_eq!(shares[0].0, 5, "remainder goes to first seat past the dealer");
    }
}
