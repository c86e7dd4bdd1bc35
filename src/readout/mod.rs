mod charge;
mod digitizer;
mod timing;

pub use charge::ChargeIntegrator;
pub use digitizer::{Digitizer, PeakFit};
pub use timing::TimingExtractor;
