//! Cube map environment: six image faces fetched over HTTP and decoded on
//! the CPU. The renderer uploads them once a device exists.

use anyhow::{anyhow, bail, Context, Result};
use image::RgbaImage;
use wasm_bindgen::JsCast;

/// Decoded cube faces in +x, -x, +y, -y, +z, -z order, RGBA8.
#[derive(Clone, Debug)]
pub struct CubeFaces {
    pub size: u32,
    pub faces: Vec<Vec<u8>>,
}

impl CubeFaces {
    pub fn from_images(images: Vec<RgbaImage>) -> Result<Self> {
        if images.len() != 6 {
            bail!("a cube map needs 6 faces, got {}", images.len());
        }
        let size = images[0].width();
        if size == 0 {
            bail!("cube face is empty");
        }
        for (i, img) in images.iter().enumerate() {
            if img.width() != size || img.height() != size {
                bail!(
                    "cube face {} is {}x{}, expected {}x{}",
                    i,
                    img.width(),
                    img.height(),
                    size,
                    size
                );
            }
        }
        Ok(Self {
            size,
            faces: images.into_iter().map(RgbaImage::into_raw).collect(),
        })
    }

    /// Decode six encoded images (PNG or JPEG).
    pub fn decode(encoded: &[Vec<u8>]) -> Result<Self> {
        let images = encoded
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                image::load_from_memory(bytes)
                    .map(|img| img.to_rgba8())
                    .with_context(|| format!("failed to decode cube face {}", i))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_images(images)
    }
}

async fn fetch_bytes(url: &str) -> Result<Vec<u8>> {
    let window = web_sys::window().ok_or(anyhow!("no window"))?;
    let response = wasm_bindgen_futures::JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(|err| anyhow!("fetch {} failed: {:?}", url, err))?;
    let response: web_sys::Response = response
        .dyn_into()
        .map_err(|_| anyhow!("fetch {} did not return a response", url))?;
    if !response.ok() {
        bail!("fetch {} returned status {}", url, response.status());
    }
    let buffer = response
        .array_buffer()
        .map_err(|err| anyhow!("read {} failed: {:?}", url, err))?;
    let buffer = wasm_bindgen_futures::JsFuture::from(buffer)
        .await
        .map_err(|err| anyhow!("read {} failed: {:?}", url, err))?;
    Ok(js_sys::Uint8Array::new(&buffer).to_vec())
}

/// Fetch and decode the six faces at `urls`.
pub async fn load_cube_faces(urls: &[String; 6]) -> Result<CubeFaces> {
    let mut encoded = Vec::with_capacity(6);
    for url in urls {
        encoded.push(fetch_bytes(url).await?);
    }
    CubeFaces::decode(&encoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_square_faces_are_accepted() {
        let faces = CubeFaces::from_images(vec![RgbaImage::new(4, 4); 6]).unwrap();
        assert_eq!(faces.size, 4);
        assert_eq!(faces.faces.len(), 6);
        assert_eq!(faces.faces[5].len(), 4 * 4 * 4);
    }

    #[test]
    fn wrong_face_count_is_rejected() {
        assert!(CubeFaces::from_images(vec![RgbaImage::new(4, 4); 5]).is_err());
    }

    #[test]
    fn mismatched_faces_are_rejected() {
        let mut images = vec![RgbaImage::new(4, 4); 6];
        images[3] = RgbaImage::new(4, 2);
        assert!(CubeFaces::from_images(images).is_err());
    }

    #[test]
    fn garbage_bytes_do_not_decode() {
        let encoded = vec![vec![1u8, 2, 3]; 6];
        assert!(CubeFaces::decode(&encoded).is_err());
    }
}
