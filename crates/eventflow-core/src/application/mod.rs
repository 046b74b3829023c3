/// Dispatcher seam and the in-process route table
pub mod dispatcher;

/// Flow executor
pub mod flow_executor;

/// Mapping evaluation
pub mod mapper;

/// Route and monitor overrides
pub mod overrides;
