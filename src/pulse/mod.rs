mod response;
mod synthesizer;

pub use response::SinglePhotonResponse;
pub use synthesizer::PulseSynthesizer;
