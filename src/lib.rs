pub mod dataset;
pub mod etl;
pub mod normalize;
pub mod sink;
pub mod snapshot;
pub mod sql;
