pub mod parser;

pub use parser::{is_well_formed_token, parse_report, parse_report_value, SeverityFilter};
