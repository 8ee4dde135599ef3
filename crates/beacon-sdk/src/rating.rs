//! Star rating.

use crate::{validation, Beacon, SdkResult};
use beacon_events::{keys, NewEvent, Segmentation};

impl Beacon {
    /// Report a 1 to 5 star rating for an app version.
    pub async fn report_star_rating(
        &self,
        platform: &str,
        app_version: &str,
        rating: u8,
    ) -> SdkResult<()> {
        if !(1..=5).contains(&rating) {
            return Err(validation(format!("rating must be between 1 and 5, got {rating}")));
        }
        if platform.trim().is_empty() || app_version.trim().is_empty() {
            return Err(validation("platform and app version are required"));
        }
        if self.test_mode() {
            return Ok(());
        }

        let segmentation = Segmentation::new()
            .with("platform", platform)
            .with("app_version", app_version)
            .with("rating", i64::from(rating));
        self.aggregator
            .record_event(NewEvent::new(keys::STAR_RATING).segmentation(segmentation))
            .await?;
        Ok(())
    }
}
