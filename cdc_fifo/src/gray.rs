//! Reflected binary (Gray) code conversion for queue pointers.
//!
//! Consecutive pointer values differ in exactly one bit once Gray-coded, so a
//! reader that samples a pointer while it is being advanced sees either the
//! old or the new value, never a mix of the two.

/// Converts a binary counter value to Gray code.
#[inline]
pub const fn to_gray(bin: usize) -> usize {
    bin ^ (bin >> 1)
}

/// Converts a Gray-coded value back to binary.
#[inline]
pub const fn from_gray(gray: usize) -> usize {
    let mut bin = gray;
    let mut shift = 1;
    while shift < usize::BITS {
        bin ^= bin >> shift;
        shift <<= 1;
    }
    bin
}
