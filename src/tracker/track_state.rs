/// Lifecycle of a track inside the association tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    /// Created from a detection, not yet confirmed
    #[default]
    New,
    /// Matched on the latest frame
    Tracked,
    /// Unmatched, kept for re-identification within the track buffer
    Lost,
    /// Dropped for good
    Removed,
}
