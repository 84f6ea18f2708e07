//! `MCSControl` transport.
//!
//! Thin safe layer over the `mcs-sys` declarations. The library is linked by
//! `mcs-sys`, so there is no per-process init step; this type just forwards
//! each primitive and converts the return value into a [`TransportResult`].

use super::{McsTransport, ResultCode, SystemHandle, TransportResult};
use mcs_sys as sys;
use std::ffi::CString;
use std::os::raw::{c_char, c_uint};

/// Transport backed by the native `MCSControl` library.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeTransport;

impl NativeTransport {
    pub fn new() -> Self {
        Self
    }
}

fn to_cstring(value: &str) -> TransportResult<CString> {
    CString::new(value).map_err(|_| ResultCode(sys::SA_INVALID_SYSTEM_LOCATOR_ERROR))
}

#[allow(unsafe_code)]
impl McsTransport for NativeTransport {
    fn find_systems(&self) -> TransportResult<String> {
        let mut buffer = vec![0u8; sys::SA_LOCATOR_BUFFER_LEN];
        let mut size = buffer.len() as c_uint;

        // SAFETY: buffer outlives the call and `size` holds its capacity.
        let status = unsafe {
            sys::SA_FindSystems(
                std::ptr::null(),
                buffer.as_mut_ptr() as *mut c_char,
                &mut size,
            )
        };
        ResultCode::check(status)?;

        let written = (size as usize).min(buffer.len());
        let end = buffer[..written]
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(written);
        Ok(String::from_utf8_lossy(&buffer[..end]).into_owned())
    }

    fn open_system(&self, locator: &str, mode: &str) -> TransportResult<SystemHandle> {
        let locator = to_cstring(locator)?;
        let options = to_cstring(mode)?;
        let mut index: sys::SA_INDEX = 0;

        // SAFETY: both strings are NUL-terminated and live across the call.
        let status = unsafe { sys::SA_OpenSystem(&mut index, locator.as_ptr(), options.as_ptr()) };
        ResultCode::check(status)?;
        Ok(SystemHandle(index))
    }

    fn close_system(&self, handle: SystemHandle) -> TransportResult<()> {
        // SAFETY: plain value arguments.
        ResultCode::check(unsafe { sys::SA_CloseSystem(handle.0) })
    }

    fn channel_count(&self, handle: SystemHandle) -> TransportResult<u32> {
        let mut count: c_uint = 0;
        // SAFETY: `count` is a valid out-pointer for the duration of the call.
        let status = unsafe { sys::SA_GetNumberOfChannels(handle.0, &mut count) };
        ResultCode::check(status)?;
        Ok(count)
    }

    fn issue_relative_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        delta_nm: i32,
    ) -> TransportResult<()> {
        // SAFETY: plain value arguments. Hold time 0 releases the position
        // once the target is reached.
        ResultCode::check(unsafe { sys::SA_GotoPositionRelative_S(handle.0, channel, delta_nm, 0) })
    }

    fn issue_step_move(
        &self,
        handle: SystemHandle,
        channel: u32,
        steps: i32,
        amplitude: u32,
        frequency: u32,
    ) -> TransportResult<()> {
        // SAFETY: plain value arguments.
        ResultCode::check(unsafe {
            sys::SA_StepMove_S(handle.0, channel, steps, amplitude, frequency)
        })
    }

    fn query_status(&self, handle: SystemHandle, channel: u32) -> TransportResult<u32> {
        let mut status: c_uint = 0;
        // SAFETY: `status` is a valid out-pointer for the duration of the call.
        let code = unsafe { sys::SA_GetStatus_S(handle.0, channel, &mut status) };
        ResultCode::check(code)?;
        Ok(status)
    }

    fn stop(&self, handle: SystemHandle, channel: u32) -> TransportResult<()> {
        // SAFETY: plain value arguments.
        ResultCode::check(unsafe { sys::SA_Stop_S(handle.0, channel) })
    }
}
