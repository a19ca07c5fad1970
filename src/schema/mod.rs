pub mod definition;
pub mod field;
pub mod validate;
pub mod wire;

pub use definition::{FieldEntry, Schema, SchemaBuilder, ID_KEY, ROOT_SEGMENT};
pub use field::{EnumTable, FieldDesc, FieldId, FieldType, FieldTypeTag, SelectOption, Validator};
pub use validate::{email_validator, validate_payload};
