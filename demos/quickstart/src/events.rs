//! The one domain event this demo publishes, to show the bus wired through
//! an `#[ambient]` controller dependency rather than a hand-rolled `Arc`
//! passed around manually.

#[derive(Debug, Clone)]
pub struct Greeted {
    pub name: String,
}
