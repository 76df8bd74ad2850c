//! Feed tabs for the community post list.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedTab {
    /// Newest first.
    #[default]
    ForYou,
    /// Most liked first, newest first among equals.
    Trending,
}

impl FeedTab {
    /// Unknown or missing tabs fall back to `ForYou`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("trending") => FeedTab::Trending,
            _ => FeedTab::ForYou,
        }
    }

    pub fn order_by(self) -> &'static str {
        match self {
            FeedTab::ForYou => " ORDER BY p.created_at DESC, p.id",
            FeedTab::Trending => " ORDER BY likes_count DESC, p.created_at DESC, p.id",
        }
    }
}

impl fmt::Display for FeedTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FeedTab::ForYou => "for_you",
            FeedTab::Trending => "trending",
        })
    }
}

#[cfg(test)]
mod tests {
    use std::cmp::Ordering;

    use time::{macros::datetime, OffsetDateTime};

    use super::*;

    struct Row {
        name: &'static str,
        likes: i64,
        created_at: OffsetDateTime,
    }

    /// Same ordering as `order_by`, evaluated in memory.
    fn compare(tab: FeedTab, a: &Row, b: &Row) -> Ordering {
        match tab {
            FeedTab::ForYou => b.created_at.cmp(&a.created_at),
            FeedTab::Trending => b
                .likes
                .cmp(&a.likes)
                .then_with(|| b.created_at.cmp(&a.created_at)),
        }
    }

    fn ordered(tab: FeedTab, mut rows: Vec<Row>) -> Vec<&'static str> {
        rows.sort_by(|a, b| compare(tab, a, b));
        rows.into_iter().map(|r| r.name).collect()
    }

    fn sample() -> Vec<Row> {
        vec![
            Row {
                name: "P1",
                likes: 3,
                created_at: datetime!(2024-05-02 10:00 UTC),
            },
            Row {
                name: "P2",
                likes: 5,
                created_at: datetime!(2024-05-01 10:00 UTC),
            },
        ]
    }

    #[test]
    fn trending_puts_most_liked_first() {
        assert_eq!(ordered(FeedTab::Trending, sample()), vec!["P2", "P1"]);
    }

    #[test]
    fn default_tab_is_newest_first() {
        assert_eq!(ordered(FeedTab::parse(None), sample()), vec!["P1", "P2"]);
    }

    #[test]
    fn trending_ties_break_on_recency() {
        let rows = vec![
            Row {
                name: "old",
                likes: 2,
                created_at: datetime!(2024-01-01 0:00 UTC),
            },
            Row {
                name: "new",
                likes: 2,
                created_at: datetime!(2024-02-01 0:00 UTC),
            },
        ];
        assert_eq!(ordered(FeedTab::Trending, rows), vec!["new", "old"]);
    }

    #[test]
    fn parse_tabs() {
        assert_eq!(FeedTab::parse(Some("trending")), FeedTab::Trending);
        assert_eq!(FeedTab::parse(Some("for_you")), FeedTab::ForYou);
        assert_eq!(FeedTab::parse(Some("bogus")), FeedTab::ForYou);
        assert_eq!(FeedTab::Trending.to_string(), "trending");
    }

    #[test]
    fn sql_order_matches_comparator() {
        assert!(FeedTab::Trending
            .order_by()
            .starts_with(" ORDER BY likes_count DESC, p.created_at DESC"));
        assert!(FeedTab::ForYou.order_by().starts_with(" ORDER BY p.created_at DESC"));
    }
}
