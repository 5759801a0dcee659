
pub(crate) use factory::{CountingFactory, EpsgFactory, WEB_MERCATOR_RADIUS};
pub(crate) use lakes::{lake, lake_untagged, lakes_schema};
