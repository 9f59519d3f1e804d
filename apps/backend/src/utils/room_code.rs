//! Room code generation.
//!
//! Room codes are 10 lowercase hexadecimal characters. They double as the
//! match id and the room's broadcast channel name.

use rand::Rng;

pub const ROOM_CODE_LEN: usize = 10;

const HEX: &[u8] = b"0123456789abcdef";

/// Generate a fresh room code from the thread-local CSPRNG.
///
/// # Example
/// ```
/// use broadside::utils::room_code::generate_room_code;
///
/// let code = generate_room_code();
/// assert_eq!(code.len(), 10);
/// ```
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}
