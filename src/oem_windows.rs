//! OEM string conversion on Windows.
//!
//! Windows exposes the configured ANSI code page through `MultiByteToWideChar` and
//! `WideCharToMultiByte`. Both are called twice: once to size the output buffer and once to fill
//! it.


use windows::Win32::Globalization::{
    CP_ACP, MB_ERR_INVALID_CHARS, MB_PRECOMPOSED, MultiByteToWideChar, WC_COMPOSITECHECK,
    WideCharToMultiByte,
};


/// Turns the return value of a Win32 conversion call into a non-zero buffer length.
fn converted_len(ret: i32) -> Option<usize> {
    match usize::try_from(ret) {
        Ok(0) | Err(_) => None,
        Ok(len) => Some(len),
    }
}


/// Decodes an OEM-encoded byte string.
pub fn decode_oem(oem_bytes: &[u8]) -> Option<String> {
    if oem_bytes.is_empty() {
        return Some(String::new());
    }

    let flags = MB_ERR_INVALID_CHARS | MB_PRECOMPOSED;
    let needed = converted_len(unsafe { MultiByteToWideChar(CP_ACP, flags, oem_bytes, None) })?;

    let mut wide = vec![0u16; needed];
    let written = converted_len(unsafe {
        MultiByteToWideChar(CP_ACP, flags, oem_bytes, Some(wide.as_mut_slice()))
    })?;
    wide.truncate(written);

    String::from_utf16(&wide).ok()
}


/// Encodes a string using the OEM encoding.
pub fn encode_oem(string: &str) -> Option<Vec<u8>> {
    if string.is_empty() {
        return Some(Vec::new());
    }

    let wide: Vec<u16> = string.encode_utf16().collect();
    let needed = converted_len(unsafe {
        WideCharToMultiByte(CP_ACP, WC_COMPOSITECHECK, &wide, None, None, None)
    })?;

    let mut narrow = vec![0u8; needed];
    let written = converted_len(unsafe {
        WideCharToMultiByte(CP_ACP, WC_COMPOSITECHECK, &wide, Some(narrow.as_mut_slice()), None, None)
    })?;
    narrow.truncate(written);

    Some(narrow)
}
