use std::time::Duration;

use futures::future::LocalBoxFuture;

/// Source of suspension for the single UI event loop.
///
/// Everything that waits (readiness polling, signal timeouts) goes through
/// this trait so the same code runs on the browser event loop and under a
/// paused tokio clock in tests.
pub trait Timer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Copy, Clone)]
pub struct TokioTimer;

#[cfg(not(target_arch = "wasm32"))]
impl Timer for TokioTimer {
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[cfg(target_arch = "wasm32")]
mod browser {
    use std::time::Duration;

    use futures::future::LocalBoxFuture;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_futures::JsFuture;

    use super::Timer;

    /// `setTimeout`-backed sleep; yields to the browser between polls.
    #[derive(Debug, Default, Copy, Clone)]
    pub struct BrowserTimer;

    impl Timer for BrowserTimer {
        fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
            let ms = duration.as_millis().min(i32::MAX as u128) as i32;
            let promise = js_sys::Promise::new(&mut |resolve, _reject| {
                match web_sys::window() {
                    Some(window) => {
                        let _ = window
                            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms);
                    }
                    None => {
                        let _ = resolve.call0(&JsValue::UNDEFINED);
                    }
                }
            });
            Box::pin(async move {
                let _ = JsFuture::from(promise).await;
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserTimer;
