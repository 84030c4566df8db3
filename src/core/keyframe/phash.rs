use super::frame::Frame;
use image::{imageops, GrayImage};
use once_cell::sync::Lazy;
use rustdct::{Dct2, DctPlanner, TransformType2And3};
use std::sync::Arc;

const HASH_INPUT: usize = 32;
const HASH_BLOCK: usize = 8;

static DCT_32: Lazy<Arc<dyn TransformType2And3<f64>>> =
    Lazy::new(|| DctPlanner::new().plan_dct2(HASH_INPUT));

/// 64 位 DCT 感知哈希
///
/// 32×32 灰度 → 2D DCT-II → 左上 8×8 低频块 → 每个系数与块中位数比较得一位。
/// 对缩放、轻微色偏和压缩噪声不敏感
pub fn phash(frame: &Frame) -> u64 {
    phash_gray(&frame.to_gray())
}

pub fn phash_gray(gray: &GrayImage) -> u64 {
    let small = imageops::resize(
        gray,
        HASH_INPUT as u32,
        HASH_INPUT as u32,
        imageops::FilterType::Triangle,
    );
    let mut pixels: Vec<f64> = small.as_raw().iter().map(|&v| v as f64).collect();

    dct_2d(&mut pixels);

    let mut block = [0f64; HASH_BLOCK * HASH_BLOCK];
    for y in 0..HASH_BLOCK {
        for x in 0..HASH_BLOCK {
            block[y * HASH_BLOCK + x] = pixels[y * HASH_INPUT + x];
        }
    }

    let mut sorted = block;
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = (sorted[31] + sorted[32]) / 2.0;

    block
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v > median)
        .fold(0u64, |hash, (i, _)| hash | (1 << i))
}

pub fn hamming_distance(a: u64, b: u64) -> u32 {
    (a ^ b).count_ones()
}

/// 行变换、转置、行变换、转置
fn dct_2d(pixels: &mut [f64]) {
    for row in pixels.chunks_exact_mut(HASH_INPUT) {
        DCT_32.process_dct2(row);
    }
    transpose(pixels);
    for row in pixels.chunks_exact_mut(HASH_INPUT) {
        DCT_32.process_dct2(row);
    }
    transpose(pixels);
}

fn transpose(pixels: &mut [f64]) {
    for y in 0..HASH_INPUT {
        for x in (y + 1)..HASH_INPUT {
            pixels.swap(y * HASH_INPUT + x, x * HASH_INPUT + y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    /// 8×8 伪随机色块网格，放大到 width×height
    fn blocks(seed: u32, width: u32, height: u32) -> GrayImage {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        let cells: Vec<u8> = (0..64)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                40 + ((state >> 16) as u8) % 180
            })
            .collect();
        GrayImage::from_fn(width, height, |x, y| {
            let cx = (x * 8 / width).min(7);
            let cy = (y * 8 / height).min(7);
            Luma([cells[(cy * 8 + cx) as usize]])
        })
    }

    #[test]
    fn test_hamming_distance() {
        assert_eq!(hamming_distance(0b0, 0b0), 0);
        assert_eq!(hamming_distance(0b0, 0b1), 1);
        assert_eq!(hamming_distance(0b1111, 0b0000), 4);
    }

    #[test]
    fn test_hash_is_stable() {
        let img = blocks(3, 96, 64);
        assert_eq!(phash_gray(&img), phash_gray(&img));
    }

    #[test]
    fn test_hash_survives_resize() {
        for seed in 1..=4 {
            let large = blocks(seed, 640, 480);
            let small = blocks(seed, 320, 240);
            assert!(hamming_distance(phash_gray(&large), phash_gray(&small)) <= 5);
        }
    }

    #[test]
    fn test_hash_survives_brightness_shift() {
        let img = blocks(5, 256, 256);
        let brighter = GrayImage::from_fn(256, 256, |x, y| {
            Luma([img.get_pixel(x, y).0[0] + 8])
        });
        assert!(hamming_distance(phash_gray(&img), phash_gray(&brighter)) <= 5);
    }

    #[test]
    fn test_different_content_differs() {
        let a = blocks(1, 256, 256);
        let b = blocks(2, 256, 256);
        assert!(hamming_distance(phash_gray(&a), phash_gray(&b)) > 5);
    }
}
