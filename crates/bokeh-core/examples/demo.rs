//! Bokeh Demo - Blur a generated image and write it as TGA
//!
//! Run with: cargo run -p bokeh-core --example demo

use bokeh_core::tga::{self, DecodeLimits};
use bokeh_core::{Bitdepth, BlurConfig, ImageBuffer};

fn main() {
    println!("=== Bokeh Demo ===\n");

    // A dark image sprinkled with bright dots, which blur into discs.
    let width = 256;
    let height = 192;
    let mut image = ImageBuffer::new(width, height, Bitdepth::Bgr24).expect("Failed to allocate");
    for y in (16..height).step_by(48) {
        for x in (16..width).step_by(48) {
            image
                .pixel_mut(x, y)
                .expect("in bounds")
                .copy_from_slice(&[255, 220, 160]);
        }
    }
    println!("1. Created a {}x{} image with point lights", width, height);

    let config = BlurConfig::new(12.0);
    let blurred = config.run(&image).expect("Failed to blur");
    println!(
        "2. Blurred with radius {} on {} threads",
        config.radius, config.threads
    );

    let bytes = tga::encode_to_vec(&blurred).expect("Failed to encode");
    println!("3. Encoded to TGA ({} bytes)", bytes.len());

    let decoded = tga::decode(&bytes[..], DecodeLimits::UNLIMITED).expect("Failed to decode");
    assert_eq!(decoded, blurred);
    println!("4. Decoded back: {}x{}", decoded.width(), decoded.height());

    std::fs::write("bokeh_demo.tga", &bytes).expect("Failed to write bokeh_demo.tga");
    println!("\n=== Demo Complete: wrote bokeh_demo.tga ===");
}
