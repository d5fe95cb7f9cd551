//! 基础设施层
//!
//! 持有稀缺资源（浏览器、页面），只暴露能力

pub mod chrome_renderer;
pub mod js_executor;

pub use chrome_renderer::ChromeRenderer;
pub use js_executor::JsExecutor;
