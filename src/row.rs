//! Fixed-width row codec.
//!
//! A row is the triple `(id, username, email)`. On disk each row occupies
//! exactly [`SIZE_ROW`] bytes at fixed offsets; username and email each
//! reserve one extra byte beyond their stated maximum so a shorter value's
//! trailing bytes are unambiguously zero.

use crate::errors::Error;

pub const COL_SIZE_USERNAME: usize = 32;
pub const COL_SIZE_EMAIL: usize = 255;

const SIZE_ID: usize = 4;
const SIZE_USERNAME: usize = COL_SIZE_USERNAME + 1;
const SIZE_EMAIL: usize = COL_SIZE_EMAIL + 1;

pub const SIZE_ROW: usize = SIZE_ID + SIZE_USERNAME + SIZE_EMAIL;

const OFS_ID: usize = 0;
const OFS_USERNAME: usize = OFS_ID + SIZE_ID;
const OFS_EMAIL: usize = OFS_USERNAME + SIZE_USERNAME;

/// A single table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: u32,
    pub username: String,
    pub email: String,
}

impl Row {
    pub fn new(id: u32, username: impl Into<String>, email: impl Into<String>) -> Result<Self, Error> {
        let username = username.into();
        let email = email.into();
        if username.len() > COL_SIZE_USERNAME {
            return Err(err!(
                Usage,
                "username exceeds maximum length ({} > {})",
                username.len(),
                COL_SIZE_USERNAME
            ));
        }
        if email.len() > COL_SIZE_EMAIL {
            return Err(err!(
                Usage,
                "email exceeds maximum length ({} > {})",
                email.len(),
                COL_SIZE_EMAIL
            ));
        }
        Ok(Row { id, username, email })
    }

    /// Serializes the row into `buf`, which must be exactly [`SIZE_ROW`]
    /// bytes. Does not enforce string length; callers are expected to
    /// validate via [`Row::new`] first.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<(), Error> {
        if buf.len() != SIZE_ROW {
            return Err(err!(
                Storage,
                "row buffer size mismatch: expected {}, got {}",
                SIZE_ROW,
                buf.len()
            ));
        }
        buf[OFS_ID..OFS_ID + SIZE_ID].copy_from_slice(&self.id.to_le_bytes());

        let un = self.username.as_bytes();
        buf[OFS_USERNAME..OFS_USERNAME + SIZE_USERNAME].fill(0);
        buf[OFS_USERNAME..OFS_USERNAME + un.len()].copy_from_slice(un);

        let em = self.email.as_bytes();
        buf[OFS_EMAIL..OFS_EMAIL + SIZE_EMAIL].fill(0);
        buf[OFS_EMAIL..OFS_EMAIL + em.len()].copy_from_slice(em);

        Ok(())
    }

    /// Inverse of [`Row::serialize`].
    pub fn deserialize(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() != SIZE_ROW {
            return Err(err!(
                Storage,
                "row buffer size mismatch: expected {}, got {}",
                SIZE_ROW,
                buf.len()
            ));
        }
        let id = u32::from_le_bytes(buf[OFS_ID..OFS_ID + SIZE_ID].try_into().unwrap());
        let username = read_c_str(&buf[OFS_USERNAME..OFS_USERNAME + SIZE_USERNAME]);
        let email = read_c_str(&buf[OFS_EMAIL..OFS_EMAIL + SIZE_EMAIL]);
        Ok(Row { id, username, email })
    }
}

fn read_c_str(bytes: &[u8]) -> String {
    let trimmed = bytes.split(|&b| b == 0).next().unwrap_or(&[]);
    String::from_utf8_lossy(trimmed).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_row() {
        let row = Row::new(1, "user1", "person1@example.com").unwrap();
        let mut buf = [0u8; SIZE_ROW];
        row.serialize(&mut buf).unwrap();
        let back = Row::deserialize(&buf).unwrap();
        assert_eq!(row, back);
    }

    #[test]
    fn round_trips_max_length_strings() {
        let username = "u".repeat(COL_SIZE_USERNAME);
        let email = "e".repeat(COL_SIZE_EMAIL);
        let row = Row::new(1, username.clone(), email.clone()).unwrap();
        let mut buf = [0u8; SIZE_ROW];
        row.serialize(&mut buf).unwrap();
        let back = Row::deserialize(&buf).unwrap();
        assert_eq!(back.username, username);
        assert_eq!(back.email, email);
    }

    #[test]
    fn rejects_oversized_fields() {
        assert!(Row::new(1, "x".repeat(33), "a@b").is_err());
        assert!(Row::new(1, "user", "e".repeat(256)).is_err());
    }
}
