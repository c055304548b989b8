use std::cmp::Ordering;

use gambit_engine::cards::{parse_cards, Card};
use gambit_engine::deck::Deck;
use gambit_engine::hand::{compare, compare_hands, evaluate, Category, Comparison, HandRank};

fn rank(text: &str) -> HandRank {
    evaluate(&parse_cards(text).expect("valid cards")).expect("valid hand")
}

#[test]
fn detects_every_category() {
    let cases = [
        ("Ah Kd 9c 7s 3h", Category::HighCard),
        ("Ah Ad 9c 7s 3h", Category::OnePair),
        ("Ah Ad 9c 9s 3h", Category::TwoPair),
        ("Ah Ad Ac 7s 3h", Category::ThreeOfAKind),
        ("5c 6h 7c 8h 9d", Category::Straight),
        ("Ah Th 9h 7h 3h", Category::Flush),
        ("Kc Kd Kh Qc Qd", Category::FullHouse),
        ("Ac Ad Ah As Kc", Category::FourOfAKind),
        ("5h 6h 7h 8h 9h", Category::StraightFlush),
        ("Th Jh Qh Kh Ah", Category::RoyalFlush),
    ];
    for (text, expected) in cases {
        assert_eq!(rank(text).category, expected, "{text}");
    }
}

#[test]
fn seven_cards_pick_the_best_five() {
    let hr = rank("Th Jh Qh Kh Ah 2c 3d");
    assert_eq!(hr.category, Category::RoyalFlush);
    let hr = rank("Kc Kd Kh Qc Qd Qh 2s");
    assert_eq!(hr.category, Category::FullHouse);
    assert_eq!(hr.kickers[..2], [13, 12]);
}

#[test]
fn six_cards_are_accepted() {
    let hr = rank("2c 2d 9h 9s Kc 4d");
    assert_eq!(hr.category, Category::TwoPair);
    assert_eq!(hr.kickers[..3], [9, 2, 13]);
}

#[test]
fn category_ordering_is_correct() {
    assert_eq!(
        compare(&rank("Ac Ad Ah As Kc"), &rank("Kc Kd Kh Qc Qd")),
        Comparison::AWins
    );
    assert_eq!(
        compare(&rank("5c 6h 7c 8h 9d"), &rank("Ah Ad Ac 7s 3h")),
        Comparison::AWins
    );
    assert_eq!(
        compare(&rank("Ah Ad 9c 7s 3h"), &rank("Ah Ad 9c 9s 3h")),
        Comparison::BWins
    );
}

#[test]
fn kickers_break_ties_and_equal_ranks_tie() {
    assert_eq!(
        compare(&rank("Ah Ad Kc 7s 3h"), &rank("Ac As Qc 7d 3c")),
        Comparison::AWins
    );
    assert_eq!(
        compare(&rank("Ah Ad Kc 7s 3h"), &rank("Ac As Kd 7d 3c")),
        Comparison::Tie
    );
}

#[test]
fn evaluation_is_stable_under_permutation() {
    let mut deck = Deck::new_with_seed(2024);
    for _ in 0..8 {
        let cards = deck.draw(5).unwrap();
        let base = evaluate(&cards).unwrap();
        let mut rotated: Vec<Card> = cards.clone();
        for _ in 0..5 {
            rotated.rotate_left(1);
            assert_eq!(evaluate(&rotated).unwrap(), base);
        }
        let mut reversed = cards.clone();
        reversed.reverse();
        assert_eq!(evaluate(&reversed).unwrap(), base);
    }
}

#[test]
fn compare_is_a_total_order() {
    let mut deck = Deck::new_with_seed(77);
    let mut hands: Vec<HandRank> = Vec::new();
    for _ in 0..10 {
        hands.push(evaluate(&deck.draw(5).unwrap()).unwrap());
    }
    for a in &hands {
        for b in &hands {
            // antisymmetric
            assert_eq!(compare_hands(a, b), compare_hands(b, a).reverse());
            for c in &hands {
                if compare_hands(a, b) != Ordering::Less && compare_hands(b, c) != Ordering::Less {
                    assert_ne!(compare_hands(a, c), Ordering::Less, "transitivity");
                }
            }
        }
    }
    // the full ordering only reports equality for identical hands
    let mut sorted = hands.clone();
    sorted.sort();
    for w in sorted.windows(2) {
        assert!(w[0] < w[1]);
    }
}
