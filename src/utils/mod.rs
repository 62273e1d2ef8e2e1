pub mod concat_pcm;
pub mod encode_wav;
pub mod normalize;
pub mod order_clips;
pub mod timestamps;
