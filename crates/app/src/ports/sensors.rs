//! Sensor reader port — read-only cached sensor values.

use std::future::Future;

use rulehub_domain::sensor::SensorSnapshot;

/// Collaborator exposing the latest cached sensor readings.
///
/// Implementations must use a short bounded wait when taking their internal
/// locks; on timeout the snapshot comes back empty so conditions fail
/// closed instead of blocking a scheduler pass.
pub trait SensorReader {
    /// Take a point-in-time snapshot of every readable sensor.
    fn snapshot(&self) -> impl Future<Output = SensorSnapshot> + Send;
}
