//! C ABI for hosts that drive an effect from outside Rust.
//!
//! A handle owns one [`FrameDriver`] presenting through the CPU backend.
//! The host calls `drawbridge_render` from its frame callback and copies
//! the presented pixels out as tightly packed RGBA8.

use crate::config::DriverConfig;
use crate::driver::FrameDriver;
use crate::effect::EffectRegistry;
use crate::options::Preferences;
use crate::render::{Rotation, Viewport};
use log::warn;
use std::ffi::CStr;
use std::os::raw::c_char;
use std::time::Instant;

#[repr(C)]
pub struct DrawbridgeHandle(*mut FrameDriver);

impl DrawbridgeHandle {
    fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    /// # Safety
    /// The handle must come from [`drawbridge_new`] and not have been freed.
    unsafe fn driver<'a>(&self) -> Option<&'a mut FrameDriver> {
        self.0.as_mut()
    }
}

/// Creates a driver for the built-in effect `name`. Returns a null handle
/// when the name is unknown.
///
/// # Safety
/// `name` must be a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_new(name: *const c_char, width: u32, height: u32) -> DrawbridgeHandle {
    if name.is_null() {
        return DrawbridgeHandle::null();
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return DrawbridgeHandle::null();
    };
    let descriptor = match EffectRegistry::with_builtins().get(name) {
        Ok(d) => d,
        Err(e) => {
            warn!("drawbridge_new: {e}");
            return DrawbridgeHandle::null();
        }
    };

    let mut driver = FrameDriver::from_config(DriverConfig::default(), descriptor, Preferences::new(), Viewport::new(width, height));
    if let Err(e) = driver.setup() {
        warn!("drawbridge_new: {e}");
        return DrawbridgeHandle::null();
    }
    DrawbridgeHandle(Box::into_raw(Box::new(driver)))
}

/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_resize(handle: DrawbridgeHandle, width: u32, height: u32, rotation_degrees: u32) {
    if let Some(driver) = handle.driver() {
        let viewport = Viewport::new(width, height).with_rotation(Rotation::from_degrees(f64::from(rotation_degrees)));
        driver.resize(viewport, 1.0);
    }
}

/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_set_visible(handle: DrawbridgeHandle, visible: bool) {
    if let Some(driver) = handle.driver() {
        driver.set_visible(visible);
    }
}

/// Runs a frame if one is due. Returns 1 when a frame was presented, 0 when
/// not, and -1 on error.
///
/// # Safety
/// `handle` must be live.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_render(handle: DrawbridgeHandle) -> i32 {
    let Some(driver) = handle.driver() else {
        return -1;
    };
    match driver.tick(Instant::now()) {
        Ok(result) => i32::from(result.presented()),
        Err(e) => {
            warn!("drawbridge_render: {e}");
            -1
        }
    }
}

/// Copies the last presented frame as RGBA8 rows. Returns the number of
/// bytes written, or 0 when there is no frame or `output` is too small.
///
/// # Safety
/// `handle` must be live and `output` valid for `output_size` bytes.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_copy_pixels(handle: DrawbridgeHandle, output: *mut u8, output_size: usize) -> usize {
    let Some(driver) = handle.driver() else {
        return 0;
    };
    let Some(frame) = driver.snapshot() else {
        return 0;
    };
    let len = frame.width as usize * frame.height as usize * 4;
    if output.is_null() || output_size < len {
        return 0; // Not enough space in output buffer
    }

    let out = std::slice::from_raw_parts_mut(output, len);
    for y in 0..frame.height {
        for x in 0..frame.width {
            let i = (y as usize * frame.width as usize + x as usize) * 4;
            out[i..i + 4].copy_from_slice(&frame.rgba_at(x, y).unwrap_or_default());
        }
    }
    len
}

/// # Safety
/// `handle` must come from [`drawbridge_new`] and is invalid afterwards.
#[no_mangle]
pub unsafe extern "C" fn drawbridge_free(handle: DrawbridgeHandle) {
    if !handle.0.is_null() {
        drop(Box::from_raw(handle.0));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn unknown_effects_give_a_null_handle() {
        let name = CString::new("nope").unwrap();
        let handle = unsafe { drawbridge_new(name.as_ptr(), 10, 10) };
        assert!(handle.is_null());
        assert_eq!(unsafe { drawbridge_render(DrawbridgeHandle::null()) }, -1);
        unsafe { drawbridge_free(handle) };
    }

    #[test]
    fn renders_and_copies_pixels() {
        let name = CString::new("bouncingboxes").unwrap();
        let handle = unsafe { drawbridge_new(name.as_ptr(), 32, 24) };
        assert!(!handle.is_null());

        assert_eq!(unsafe { drawbridge_render(DrawbridgeHandle(handle.0)) }, 1);
        let mut small = vec![0u8; 16];
        assert_eq!(unsafe { drawbridge_copy_pixels(DrawbridgeHandle(handle.0), small.as_mut_ptr(), small.len()) }, 0);

        let mut pixels = vec![0u8; 32 * 24 * 4];
        let n = unsafe { drawbridge_copy_pixels(DrawbridgeHandle(handle.0), pixels.as_mut_ptr(), pixels.len()) };
        assert_eq!(n, pixels.len());
        assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));

        unsafe { drawbridge_resize(DrawbridgeHandle(handle.0), 40, 40, 0) };
        unsafe { drawbridge_free(handle) };
    }
}
