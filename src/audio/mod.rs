pub mod capture;
pub mod frame;
pub mod playback;
pub mod source;

pub use capture::CaptureController;
pub use frame::{AudioFrame, CaptureFormat};
pub use playback::PlaybackController;
pub use source::{
    AudioFrameSource, FrameFanout, FrameSubscription, SubscriptionGuard, SyntheticFrameSource,
};
