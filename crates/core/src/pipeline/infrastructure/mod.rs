pub mod in_process_executor;
pub mod isolated_process_executor;
pub mod worker_protocol;
