pub mod file_output_adapter;
pub mod record_reader;

pub use file_output_adapter::FileBatchOutputAdapter;
pub use record_reader::read_raw_records;
