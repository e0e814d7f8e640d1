use std::sync::Arc;
use time::OffsetDateTime;

pub trait ClockPort: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

pub type DynClockPort = Arc<dyn ClockPort>;
