//! Platform screen capture.
//!
//! On Windows the screen DC is copied with GDI `BitBlt` into a top-down
//! 32-bit DIB. `CAPTUREBLT` is deliberately not used, so layered windows
//! (including our own overlay) are left out of the captured pixels.

use super::source::ScreenRegionSource;

/// Returns the capture source for the current platform.
pub fn platform_source() -> Box<dyn ScreenRegionSource> {
    #[cfg(windows)]
    {
        Box::new(gdi::GdiScreenSource)
    }

    #[cfg(not(windows))]
    {
        Box::new(UnsupportedSource)
    }
}

/// Source for platforms without a capture backend; every capture fails.
#[cfg(not(windows))]
pub struct UnsupportedSource;

#[cfg(not(windows))]
impl ScreenRegionSource for UnsupportedSource {
    fn capture(
        &mut self,
        _rect: crate::grid::CellRect,
    ) -> Result<super::buffer::PixelBuffer, super::source::CaptureError> {
        Err(super::source::CaptureError::Unsupported)
    }
}

#[cfg(windows)]
mod gdi {
    use windows::Win32::Foundation::HWND;
    use windows::Win32::Graphics::Gdi::{
        BitBlt, CreateCompatibleBitmap, CreateCompatibleDC, DeleteDC, DeleteObject, GetDC,
        GetDIBits, ReleaseDC, SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS,
        HBITMAP, HDC, HGDIOBJ, SRCCOPY,
    };
    use windows::Win32::UI::WindowsAndMessaging::{
        GetSystemMetrics, SM_CXVIRTUALSCREEN, SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN,
        SM_YVIRTUALSCREEN,
    };

    use crate::capture::buffer::{from_bgra, PixelBuffer};
    use crate::capture::source::{CaptureError, ScreenRegionSource};
    use crate::grid::CellRect;

    /// Captures from the desktop through GDI. Holds no handles between calls.
    pub struct GdiScreenSource;

    /// Screen DC released on drop.
    struct ScreenDc(HDC);

    impl Drop for ScreenDc {
        fn drop(&mut self) {
            unsafe {
                let _ = ReleaseDC(HWND::default(), self.0);
            }
        }
    }

    /// Memory DC with a bitmap selected into it; restored and freed on drop.
    struct MemoryBitmap {
        dc: HDC,
        bitmap: HBITMAP,
        previous: HGDIOBJ,
    }

    impl Drop for MemoryBitmap {
        fn drop(&mut self) {
            unsafe {
                let _ = SelectObject(self.dc, self.previous);
                let _ = DeleteObject(HGDIOBJ(self.bitmap.0));
                let _ = DeleteDC(self.dc);
            }
        }
    }

    /// Bounds of the virtual desktop spanning all monitors.
    fn virtual_screen() -> CellRect {
        unsafe {
            CellRect::new(
                GetSystemMetrics(SM_XVIRTUALSCREEN),
                GetSystemMetrics(SM_YVIRTUALSCREEN),
                GetSystemMetrics(SM_CXVIRTUALSCREEN).max(0) as u32,
                GetSystemMetrics(SM_CYVIRTUALSCREEN).max(0) as u32,
            )
        }
    }

    impl ScreenRegionSource for GdiScreenSource {
        fn capture(&mut self, rect: CellRect) -> Result<PixelBuffer, CaptureError> {
            if rect.is_empty() {
                return Err(CaptureError::EmptyRegion(rect));
            }
            let screen = virtual_screen();
            if rect.left < screen.left
                || rect.top < screen.top
                || rect.right() > screen.right()
                || rect.bottom() > screen.bottom()
            {
                return Err(CaptureError::OutOfBounds(rect));
            }

            let width = rect.width as i32;
            let height = rect.height as i32;

            unsafe {
                let screen_dc = GetDC(HWND::default());
                if screen_dc.is_invalid() {
                    return Err(CaptureError::Platform("GetDC failed".to_string()));
                }
                let screen_dc = ScreenDc(screen_dc);

                let mem_dc = CreateCompatibleDC(screen_dc.0);
                if mem_dc.is_invalid() {
                    return Err(CaptureError::Platform("CreateCompatibleDC failed".to_string()));
                }
                let bitmap = CreateCompatibleBitmap(screen_dc.0, width, height);
                if bitmap.is_invalid() {
                    let _ = DeleteDC(mem_dc);
                    return Err(CaptureError::Platform(
                        "CreateCompatibleBitmap failed".to_string(),
                    ));
                }
                let previous = SelectObject(mem_dc, HGDIOBJ(bitmap.0));
                let target = MemoryBitmap {
                    dc: mem_dc,
                    bitmap,
                    previous,
                };

                BitBlt(
                    target.dc,
                    0,
                    0,
                    width,
                    height,
                    screen_dc.0,
                    rect.left,
                    rect.top,
                    SRCCOPY,
                )
                .map_err(|e| CaptureError::Platform(format!("BitBlt failed: {}", e)))?;

                let mut info = BITMAPINFO {
                    bmiHeader: BITMAPINFOHEADER {
                        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
                        biWidth: width,
                        // Negative height requests top-down rows
                        biHeight: -height,
                        biPlanes: 1,
                        biBitCount: 32,
                        biCompression: BI_RGB.0,
                        ..Default::default()
                    },
                    ..Default::default()
                };
                let mut bgra = vec![0u8; rect.width as usize * rect.height as usize * 4];
                let lines = GetDIBits(
                    target.dc,
                    target.bitmap,
                    0,
                    rect.height,
                    Some(bgra.as_mut_ptr() as *mut _),
                    &mut info,
                    DIB_RGB_COLORS,
                );
                if lines != height {
                    return Err(CaptureError::Platform(format!(
                        "GetDIBits copied {} of {} lines",
                        lines, height
                    )));
                }

                from_bgra(rect.width, rect.height, &bgra)
                    .ok_or_else(|| CaptureError::Platform("short DIB buffer".to_string()))
            }
        }
    }
}
