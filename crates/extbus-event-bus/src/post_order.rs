use std::cmp::Ordering;
use std::fmt;

/// Priority tier controlling when a subscriber runs relative to others on
/// the same event type. Lower rank runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PostOrder {
    Earliest,
    Early,
    #[default]
    Normal,
    Late,
    Latest,
    /// Observes the final state; should not modify the event
    Monitor,
}

impl PostOrder {
    pub const ALL: [PostOrder; 6] = [
        PostOrder::Earliest,
        PostOrder::Early,
        PostOrder::Normal,
        PostOrder::Late,
        PostOrder::Latest,
        PostOrder::Monitor,
    ];

    pub fn rank(self) -> i32 {
        match self {
            PostOrder::Earliest => -100,
            PostOrder::Early => -50,
            PostOrder::Normal => 0,
            PostOrder::Late => 50,
            PostOrder::Latest => 100,
            PostOrder::Monitor => 200,
        }
    }
}

impl PartialOrd for PostOrder {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PostOrder {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for PostOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PostOrder::Earliest => "earliest",
            PostOrder::Early => "early",
            PostOrder::Normal => "normal",
            PostOrder::Late => "late",
            PostOrder::Latest => "latest",
            PostOrder::Monitor => "monitor",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranks_strictly_increase() {
        let ranks: Vec<i32> = PostOrder::ALL.iter().map(|order| order.rank()).collect();
        assert!(ranks.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_ordering_follows_rank() {
        let mut orders = vec![
            PostOrder::Monitor,
            PostOrder::Normal,
            PostOrder::Earliest,
            PostOrder::Late,
        ];
        orders.sort();
        assert_eq!(
            orders,
            vec![
                PostOrder::Earliest,
                PostOrder::Normal,
                PostOrder::Late,
                PostOrder::Monitor
            ]
        );
        assert_eq!(PostOrder::default(), PostOrder::Normal);
    }
}
