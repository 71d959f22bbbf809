pub mod parser;

pub use parser::{
    load_trusted_root_from_jsonl, select_all_timestamp_authorities, select_certificate_authorities,
    select_timestamp_authorities,
};
