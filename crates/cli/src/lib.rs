// tlc library surface: catalog ingestion shared by the binary and its tests

pub mod ingest;
