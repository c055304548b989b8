use serde::{Deserialize, Serialize};

/// One pot of a hand: the main pot first, then side pots in creation order.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Pot {
    pub amount: u32,
    /// Seats that can win this pot
    pub eligible: Vec<usize>,
}

/// A seat's total contribution to the hand.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Contribution {
    pub seat: usize,
    pub amount: u32,
    pub folded: bool,
}

/// Layers contributions into a main pot and side pots.
///
/// Each distinct contribution level of a live player closes a pot. Every
/// seat pays into a layer up to what it contributed; only live players who
/// reached the level are eligible. Folded chips stay in the pots they were
/// paid into.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PotManager {
    pots: Vec<Pot>,
}

impl PotManager {
    pub fn from_entries(entries: &[Contribution]) -> Self {
        let mut levels: Vec<u32> = entries
            .iter()
            .filter(|e| !e.folded && e.amount > 0)
            .map(|e| e.amount)
            .collect();
        levels.sort_unstable();
        levels.dedup();

        let mut pots: Vec<Pot> = Vec::new();
        let mut prev = 0u32;
        for level in levels {
            let amount: u32 = entries
                .iter()
                .map(|e| e.amount.min(level) - e.amount.min(prev))
                .sum();
            let mut eligible: Vec<usize> = entries
                .iter()
                .filter(|e| !e.folded && e.amount >= level)
                .map(|e| e.seat)
                .collect();
            eligible.sort_unstable();
            pots.push(Pot { amount, eligible });
            prev = level;
        }

        // chips folded above the last live level
        let leftover: u32 = entries.iter().map(|e| e.amount.saturating_sub(prev)).sum();
        if leftover > 0 {
            if let Some(last) = pots.last_mut() {
                last.amount += leftover;
            }
        }
        Self { pots }
    }

    /// Convenience for hands where nobody folded.
    pub fn from_contributions(contributions: &[(usize, u32)]) -> Self {
        let entries: Vec<Contribution> = contributions
            .iter()
            .map(|&(seat, amount)| Contribution {
                seat,
                amount,
                folded: false,
            })
            .collect();
        Self::from_entries(&entries)
    }

    pub fn pots(&self) -> &[Pot] {
        &self.pots
    }

    pub fn main_pot(&self) -> Option<&Pot> {
        self.pots.first()
    }

    pub fn side_pots(&self) -> &[Pot] {
        self.pots.get(1..).unwrap_or(&[])
    }

    pub fn total(&self) -> u32 {
        self.pots.iter().map(|p| p.amount).sum()
    }

    pub fn into_pots(self) -> Vec<Pot> {
        self.pots
    }
}

/// Orders seats clockwise starting with the first seat after `dealer`.
pub fn order_from_dealer(seats: &mut [usize], dealer: usize, max_seats: usize) {
    let n = max_seats.max(1);
    seats.sort_by_key(|&s| (s + n - (dealer % n) - 1) % n);
}

/// Splits `amount` equally among `winners`, which must already be in
/// [`order_from_dealer`] order. The odd chips go to the first winner.
pub fn split_pot(amount: u32, winners: &[usize]) -> Vec<(usize, u32)> {
    if winners.is_empty() {
        return Vec::new();
    }
    let n = winners.len() as u32;
    let share = amount / n;
    let remainder = amount % n;
    winners
        .iter()
        .enumerate()
        .map(|(i, &seat)| {
            if i == 0 {
                (seat, share + remainder)
            } else {
                (seat, share)
            }
        })
        .collect()
}
