pub mod decode;
pub mod value;

pub use decode::column_value;
pub use value::Value;
