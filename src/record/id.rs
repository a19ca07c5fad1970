//! Identifier generation for records and sub-records.

/// Length of generated identifiers.
pub const ID_LENGTH: usize = 16;

/// Generate a random opaque identifier of [`ID_LENGTH`] hex characters.
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(ID_LENGTH);
    id
}
