//! Tier board → PNG.
//!
//! Browsers refuse to read pixels from cross-origin images, so the board is
//! exported in two phases: every remote thumbnail is first fetched and turned
//! into a `data:` URL, and only once all of them have settled is the board
//! rasterized. A thumbnail that cannot be fetched is replaced by the
//! placeholder card instead of failing the whole export.

use crate::config::PLACEHOLDER_IMAGE_URL;
use crate::data::{Episode, EpisodeId};
use crate::tiers::{Partition, TierRank, TIER_RANKS};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::join_all;
use gloo_net::http::Request;
use gloo_timers::callback::Timeout;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::{error, info, warn};
use std::io::Cursor;
use std::sync::OnceLock;
use thiserror::Error;
use wasm_bindgen::JsCast;
use web_sys::{Blob, BlobPropertyBag, HtmlAnchorElement, Url};

const CARD_WIDTH: u32 = 160;
const CARD_HEIGHT: u32 = 90;
const GAP: u32 = 4;
const LABEL_WIDTH: u32 = 80;
const CARDS_PER_LINE: u32 = 8;
const GLYPH_SCALE: u32 = 5;
const CAPTION_HEIGHT: u32 = 11;
const CAPTION_PADDING: u32 = 3;
const REVOKE_DELAY_MS: u32 = 1_000;

const BACKGROUND: Rgba<u8> = Rgba([15, 23, 42, 255]);
const ROW_BACKGROUND: Rgba<u8> = Rgba([30, 41, 59, 255]);
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([31, 41, 55, 255]);
const PLACEHOLDER_MARK: Rgba<u8> = Rgba([107, 114, 128, 255]);
const CAPTION_BACKGROUND: Rgba<u8> = Rgba([17, 24, 39, 255]);
const LIGHT_TEXT: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DARK_TEXT: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// 1×1 transparent PNG.
const BLANK_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("image unavailable: {0}")]
    Image(String),
    #[error("rasterization failed: {0}")]
    Raster(String),
    #[error("download failed: {0}")]
    Download(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardImage {
    Remote(String),
    /// A `data:` URL.
    Inline(String),
}

impl CardImage {
    fn from_url(url: &str) -> Self {
        if url.starts_with("data:") {
            CardImage::Inline(url.to_string())
        } else if url.is_empty() || url == PLACEHOLDER_IMAGE_URL {
            CardImage::Inline(placeholder_data_url().to_string())
        } else {
            CardImage::Remote(url.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardSnapshot {
    pub episode_id: EpisodeId,
    /// Same `E<n>: <name>` text the board shows under each thumbnail.
    pub label: String,
    pub image: CardImage,
}

fn card_label(episode: &Episode) -> String {
    format!("E{}: {}", episode.episode_number, episode.name)
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowSnapshot {
    pub rank: TierRank,
    pub cards: Vec<CardSnapshot>,
}

/// Detached copy of the tier rows. Unranked seasons are never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardSnapshot {
    pub rows: Vec<RowSnapshot>,
}

impl BoardSnapshot {
    pub fn capture(partition: &Partition) -> Self {
        let rows = TIER_RANKS
            .iter()
            .map(|rank| RowSnapshot {
                rank: *rank,
                cards: partition
                    .tier(rank.name)
                    .iter()
                    .map(|episode| CardSnapshot {
                        episode_id: episode.id,
                        label: card_label(episode),
                        image: CardImage::from_url(&episode.image_url),
                    })
                    .collect(),
            })
            .collect();
        Self { rows }
    }

    fn cards(&self) -> impl Iterator<Item = &CardSnapshot> {
        self.rows.iter().flat_map(|row| row.cards.iter())
    }

    pub fn is_self_contained(&self) -> bool {
        self.cards()
            .all(|card| matches!(card.image, CardImage::Inline(_)))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        let width = GAP + LABEL_WIDTH + GAP + CARDS_PER_LINE * (CARD_WIDTH + GAP);
        let height = GAP
            + self
                .rows
                .iter()
                .map(|row| row_height(row) + GAP)
                .sum::<u32>();
        (width, height)
    }
}

fn row_lines(row: &RowSnapshot) -> u32 {
    (row.cards.len() as u32).div_ceil(CARDS_PER_LINE).max(1)
}

fn row_height(row: &RowSnapshot) -> u32 {
    row_lines(row) * (CARD_HEIGHT + GAP) + GAP
}

#[async_trait(?Send)]
pub trait ImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError>;
}

/// Fetches thumbnails over CORS.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpImageFetcher;

#[async_trait(?Send)]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        let response = Request::get(url)
            .send()
            .await
            .map_err(|err| ExportError::Image(err.to_string()))?;
        if !response.ok() {
            return Err(ExportError::Image(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }
        response
            .binary()
            .await
            .map_err(|err| ExportError::Image(err.to_string()))
    }
}

pub fn placeholder_data_url() -> &'static str {
    static PLACEHOLDER: OnceLock<String> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        let mut card = RgbaImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, PLACEHOLDER_FILL);
        fill_rect(
            &mut card,
            CARD_WIDTH / 4,
            CARD_HEIGHT / 2 - 2,
            CARD_WIDTH / 2,
            4,
            PLACEHOLDER_MARK,
        );
        encode_png(card)
            .map(|bytes| png_data_url(&bytes))
            .unwrap_or_else(|err| {
                error!("Could not render placeholder card: {}", err);
                BLANK_DATA_URL.to_string()
            })
    })
}

fn png_data_url(bytes: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

fn to_data_url(bytes: &[u8]) -> Result<String, ExportError> {
    let format = image::guess_format(bytes).map_err(|err| ExportError::Image(err.to_string()))?;
    image::load_from_memory_with_format(bytes, format)
        .map_err(|err| ExportError::Image(err.to_string()))?;
    Ok(format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    ))
}

fn decode_data_url(url: &str) -> Result<DynamicImage, ExportError> {
    let (_, payload) = url
        .split_once(";base64,")
        .ok_or_else(|| ExportError::Raster("card image is not base64 inline data".to_string()))?;
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| ExportError::Raster(err.to_string()))?;
    image::load_from_memory(&bytes).map_err(|err| ExportError::Raster(err.to_string()))
}

async fn resolve_card_image<F: ImageFetcher + ?Sized>(fetcher: &F, image: &CardImage) -> String {
    match image {
        CardImage::Inline(url) => url.clone(),
        CardImage::Remote(url) => {
            match fetcher.fetch(url).await.and_then(|bytes| to_data_url(&bytes)) {
                Ok(inline) => inline,
                Err(err) => {
                    warn!("Using placeholder for {}: {}", url, err);
                    placeholder_data_url().to_string()
                }
            }
        }
    }
}

/// Inlines every remote card image. All fetches run concurrently and are
/// awaited together.
pub async fn inline_images<F: ImageFetcher + ?Sized>(
    fetcher: &F,
    board: BoardSnapshot,
) -> BoardSnapshot {
    let mut board = board;
    let resolved = join_all(
        board
            .cards()
            .map(|card| resolve_card_image(fetcher, &card.image)),
    )
    .await;

    let mut resolved = resolved.into_iter();
    for card in board.rows.iter_mut().flat_map(|row| row.cards.iter_mut()) {
        if let Some(url) = resolved.next() {
            card.image = CardImage::Inline(url);
        }
    }
    board
}

fn fill_rect(canvas: &mut RgbaImage, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let block = RgbaImage::from_pixel(width, height, color);
    imageops::replace(canvas, &block, x as i64, y as i64);
}

/// 5×7 bitmaps, one row per byte. Letters are matched case-insensitively;
/// anything else is left blank.
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '0' => [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
        '1' => [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        '2' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
        '3' => [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
        '4' => [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
        '5' => [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
        '6' => [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
        '7' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
        '8' => [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
        '9' => [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
        '+' => [0b00000, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0b00000],
        '-' => [0b00000, 0b00000, 0b00000, 0b11111, 0b00000, 0b00000, 0b00000],
        ':' => [0b00000, 0b01100, 0b01100, 0b00000, 0b01100, 0b01100, 0b00000],
        '.' => [0b00000, 0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b01100],
        ',' => [0b00000, 0b00000, 0b00000, 0b00000, 0b01100, 0b00100, 0b01000],
        '\'' => [0b01100, 0b00100, 0b01000, 0b00000, 0b00000, 0b00000, 0b00000],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        '&' => [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101],
        '(' => [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010],
        ')' => [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000],
        '/' => [0b00000, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b00000],
        _ => return None,
    };
    Some(rows)
}

fn text_width(text: &str, scale: u32) -> u32 {
    (text.chars().count() as u32 * 6 * scale).saturating_sub(scale)
}

/// Draws `text` with its top-left corner at (`x`, `y`).
fn draw_text(canvas: &mut RgbaImage, text: &str, x: u32, y: u32, scale: u32, color: Rgba<u8>) {
    let mut pen_x = x;
    for ch in text.chars() {
        if let Some(rows) = glyph(ch) {
            for (row_index, bits) in rows.iter().enumerate() {
                for column in 0..5u32 {
                    if bits & (0b10000 >> column) != 0 {
                        fill_rect(
                            canvas,
                            pen_x + column * scale,
                            y + row_index as u32 * scale,
                            scale,
                            scale,
                            color,
                        );
                    }
                }
            }
        }
        pen_x += 6 * scale;
    }
}

fn draw_label(canvas: &mut RgbaImage, text: &str, x: u32, y: u32, width: u32, height: u32, color: Rgba<u8>) {
    let pen_x = x + width.saturating_sub(text_width(text, GLYPH_SCALE)) / 2;
    let pen_y = y + height.saturating_sub(7 * GLYPH_SCALE) / 2;
    draw_text(canvas, text, pen_x, pen_y, GLYPH_SCALE, color);
}

/// Caption strip along the bottom edge of a card, cut to what fits.
fn draw_caption(canvas: &mut RgbaImage, label: &str, card_x: u32, card_y: u32) {
    let strip_y = card_y + CARD_HEIGHT - CAPTION_HEIGHT;
    fill_rect(canvas, card_x, strip_y, CARD_WIDTH, CAPTION_HEIGHT, CAPTION_BACKGROUND);

    let max_chars = ((CARD_WIDTH - 2 * CAPTION_PADDING + 1) / 6) as usize;
    let visible: String = label.chars().take(max_chars).collect();
    draw_text(
        canvas,
        &visible,
        card_x + CAPTION_PADDING,
        strip_y + (CAPTION_HEIGHT - 7) / 2,
        1,
        LIGHT_TEXT,
    );
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, ExportError> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|err| ExportError::Raster(err.to_string()))?;
    Ok(bytes)
}

/// Draws a self-contained board. Boards that still reference remote images
/// are refused.
pub fn rasterize(board: &BoardSnapshot) -> Result<Vec<u8>, ExportError> {
    if !board.is_self_contained() {
        return Err(ExportError::Raster(
            "board still references remote images".to_string(),
        ));
    }

    let (width, height) = board.dimensions();
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    let cards_x = GAP + LABEL_WIDTH + GAP;
    let mut y = GAP;

    for row in &board.rows {
        let row_height = row_height(row);
        let [r, g, b] = row.rank.rgb;
        fill_rect(&mut canvas, GAP, y, LABEL_WIDTH, row_height, Rgba([r, g, b, 255]));
        let text_color = if row.rank.dark_text { DARK_TEXT } else { LIGHT_TEXT };
        draw_label(&mut canvas, row.rank.name, GAP, y, LABEL_WIDTH, row_height, text_color);
        fill_rect(
            &mut canvas,
            cards_x,
            y,
            width - cards_x - GAP,
            row_height,
            ROW_BACKGROUND,
        );

        for (index, card) in row.cards.iter().enumerate() {
            let CardImage::Inline(url) = &card.image else {
                continue;
            };
            let index = index as u32;
            let card_x = cards_x + (index % CARDS_PER_LINE) * (CARD_WIDTH + GAP);
            let card_y = y + GAP + (index / CARDS_PER_LINE) * (CARD_HEIGHT + GAP);
            let thumbnail = decode_data_url(url)?
                .resize_to_fill(CARD_WIDTH, CARD_HEIGHT, FilterType::Triangle)
                .to_rgba8();
            imageops::overlay(&mut canvas, &thumbnail, card_x as i64, card_y as i64);
            draw_caption(&mut canvas, &card.label, card_x, card_y);
        }

        y += row_height + GAP;
    }

    encode_png(canvas)
}

pub fn export_filename(show_name: &str) -> String {
    let mut slug = String::new();
    for ch in show_name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug.trim_matches('_');
    format!("tierlist_{}.png", if slug.is_empty() { "show" } else { slug })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub filename: String,
    pub png: Vec<u8>,
}

pub async fn export_tier_list<F: ImageFetcher + ?Sized>(
    fetcher: &F,
    partition: &Partition,
    show_name: &str,
) -> Result<ExportArtifact, ExportError> {
    let board = inline_images(fetcher, BoardSnapshot::capture(partition)).await;
    let png = rasterize(&board)?;
    info!("Exported tier list for {} ({} bytes)", show_name, png.len());
    Ok(ExportArtifact {
        filename: export_filename(show_name),
        png,
    })
}

/// Hands the PNG to the browser as a file download.
pub fn download(artifact: &ExportArtifact) -> Result<(), ExportError> {
    let js_error = |err: wasm_bindgen::JsValue| ExportError::Download(format!("{:?}", err));

    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or_else(|| ExportError::Download("no document".to_string()))?;

    let bytes = js_sys::Uint8Array::from(artifact.png.as_slice());
    let parts = js_sys::Array::of1(&bytes);
    let options = BlobPropertyBag::new();
    options.set_type("image/png");
    let blob = Blob::new_with_u8_array_sequence_and_options(&parts, &options).map_err(js_error)?;
    let url = Url::create_object_url_with_blob(&blob).map_err(js_error)?;

    let anchor: HtmlAnchorElement = document
        .create_element("a")
        .map_err(js_error)?
        .dyn_into()
        .map_err(|_| ExportError::Download("anchor element unavailable".to_string()))?;
    anchor.set_href(&url);
    anchor.set_download(&artifact.filename);

    let body = document.body();
    if let Some(body) = &body {
        body.append_child(&anchor).map_err(js_error)?;
    }
    anchor.click();
    anchor.remove();

    // The click only queues the download; the URL must outlive it.
    Timeout::new(REVOKE_DELAY_MS, move || {
        if let Err(err) = Url::revoke_object_url(&url) {
            warn!("Could not revoke export URL: {:?}", err);
        }
    })
    .forget();
    Ok(())
}
