use bytes::{Buf, BytesMut};
use chrono::Local;
use rmpv::Value;

use crate::error::{Error, Result};
use crate::models::image::{Image, ImageFormat, StreamEvent};

/// Decodes one complete frame payload into a typed event.
///
/// The payload is a self-describing msgpack map carrying at least
/// `event_type`, `samp_ix`, `gen_id` and a binary `image`; intermediate
/// frames additionally carry `step_ix` and `sigma`. Anything else is a
/// frame-level decode failure, which callers treat as skippable.
pub fn decode_frame(payload: &[u8]) -> Result<StreamEvent> {
    let value = rmpv::decode::read_value(&mut &payload[..])
        .map_err(|e| Error::Decode(format!("invalid msgpack frame: {}", e)))?;

    let map = match &value {
        Value::Map(entries) => entries,
        _ => return Err(Error::Decode("frame is not a msgpack map".to_string())),
    };

    let event_type = map_str(map, "event_type")
        .ok_or_else(|| Error::Decode("frame lacks an event_type tag".to_string()))?;
    let samp_ix = map_u64(map, "samp_ix")
        .ok_or_else(|| Error::Decode("frame lacks samp_ix".to_string()))? as u32;
    let gen_id = map_gen_id(map)
        .ok_or_else(|| Error::Decode("frame lacks gen_id".to_string()))?;
    let image_data = map_bin(map, "image")
        .ok_or_else(|| Error::Decode("frame lacks binary image data".to_string()))?;

    let format = ImageFormat::detect(&image_data).ok_or_else(|| {
        Error::ImageProcessing(format!(
            "unsupported image format in frame: {:02x?}",
            &image_data[..image_data.len().min(8)]
        ))
    })?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    match event_type.as_str() {
        "final" => Ok(StreamEvent::Final {
            samp_ix,
            gen_id,
            image: Image::new(
                format!("{}_final.{}", timestamp, format.extension()),
                image_data,
            ),
        }),
        "intermediate" => {
            let step_ix = map_u64(map, "step_ix").unwrap_or(0) as u32;
            let sigma = map_f64(map, "sigma").unwrap_or(0.0);
            Ok(StreamEvent::Intermediate {
                samp_ix,
                step_ix,
                gen_id,
                sigma,
                image: Image::new(
                    format!("{}_step_{:02}.{}", timestamp, step_ix, format.extension()),
                    image_data,
                ),
            })
        }
        other => Err(Error::Decode(format!("unknown event_type: {}", other))),
    }
}

fn map_get<'a>(map: &'a [(Value, Value)], key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn map_str(map: &[(Value, Value)], key: &str) -> Option<String> {
    map_get(map, key)?.as_str().map(str::to_string)
}

fn map_u64(map: &[(Value, Value)], key: &str) -> Option<u64> {
    map_get(map, key)?.as_u64()
}

fn map_f64(map: &[(Value, Value)], key: &str) -> Option<f64> {
    let value = map_get(map, key)?;
    value.as_f64().or_else(|| value.as_i64().map(|i| i as f64))
}

fn map_bin(map: &[(Value, Value)], key: &str) -> Option<Vec<u8>> {
    match map_get(map, key)? {
        Value::Binary(data) => Some(data.clone()),
        _ => None,
    }
}

// The service emits gen_id sometimes as an integer, sometimes as a string.
fn map_gen_id(map: &[(Value, Value)]) -> Option<String> {
    match map_get(map, "gen_id")? {
        Value::String(s) => s.as_str().map(str::to_string),
        Value::Integer(i) => Some(i.to_string()),
        _ => None,
    }
}

/// Incremental decoder for the length-prefixed event stream.
///
/// Chunks may split at any byte boundary, including inside a length prefix
/// or a frame payload. Each `feed_chunk` call drains every complete frame
/// out of the buffer and returns the decoded events in arrival order; a
/// frame that fails to decode is consumed and skipped, so the next frame
/// stays in sync.
#[derive(Debug, Default)]
pub struct StreamEventParser {
    buffer: BytesMut,
    expected: Option<usize>,
}

impl StreamEventParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed_chunk(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            if self.expected.is_none() {
                if self.buffer.len() < 4 {
                    break;
                }
                self.expected = Some(self.buffer.get_u32() as usize);
            }

            let expected = self.expected.unwrap();
            if self.buffer.len() < expected {
                break;
            }

            let frame = self.buffer.split_to(expected);
            self.expected = None;

            match decode_frame(&frame) {
                Ok(event) => events.push(event),
                Err(e) => log::debug!("skipping undecodable frame ({} bytes): {}", frame.len(), e),
            }
        }
        events
    }
}

/// Walks a fully received response buffer and returns every decodable event
/// in order. Corrupt frames are skipped; a truncated tail is tolerated; an
/// empty response is fatal.
pub fn parse_event_stream(data: &[u8]) -> Result<Vec<StreamEvent>> {
    if data.is_empty() {
        return Err(Error::Decode("empty event stream response".to_string()));
    }

    let mut events = Vec::new();
    let mut offset = 0usize;
    while offset + 4 <= data.len() {
        let length =
            u32::from_be_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
                as usize;
        let start = offset + 4;
        let end = (start + length).min(data.len());
        if start >= data.len() {
            break;
        }

        match decode_frame(&data[start..end]) {
            Ok(event) => events.push(event),
            Err(e) => log::debug!("skipping undecodable frame at offset {}: {}", offset, e),
        }
        offset = start + length;
    }
    Ok(events)
}

/// Extracts only the finished images from a fully received response.
pub fn final_images(data: &[u8]) -> Result<Vec<Image>> {
    Ok(parse_event_stream(data)?
        .into_iter()
        .filter(StreamEvent::is_final)
        .map(StreamEvent::into_image)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\n rest of image";
    const JPEG: &[u8] = b"\xff\xd8\xff\xe0 rest of image";

    fn value_map(entries: Vec<(&str, Value)>) -> Value {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::from(k), v))
                .collect(),
        )
    }

    fn final_payload(samp_ix: u32, gen_id: u64) -> Vec<u8> {
        encode(value_map(vec![
            ("event_type", Value::from("final")),
            ("samp_ix", Value::from(samp_ix)),
            ("gen_id", Value::from(gen_id)),
            ("image", Value::Binary(PNG.to_vec())),
        ]))
    }

    fn intermediate_payload(samp_ix: u32, step_ix: u32, sigma: f64) -> Vec<u8> {
        encode(value_map(vec![
            ("event_type", Value::from("intermediate")),
            ("samp_ix", Value::from(samp_ix)),
            ("step_ix", Value::from(step_ix)),
            ("gen_id", Value::from("abc123")),
            ("sigma", Value::from(sigma)),
            ("image", Value::Binary(JPEG.to_vec())),
        ]))
    }

    fn encode(value: Value) -> Vec<u8> {
        let mut out = Vec::new();
        rmpv::encode::write_value(&mut out, &value).unwrap();
        out
    }

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut out = (payload.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn decodes_final_frame() {
        let event = decode_frame(&final_payload(2, 987654)).unwrap();
        match event {
            StreamEvent::Final {
                samp_ix,
                gen_id,
                image,
            } => {
                assert_eq!(samp_ix, 2);
                assert_eq!(gen_id, "987654");
                assert_eq!(image.data, PNG);
                assert!(image.filename.ends_with("_final.png"));
            }
            other => panic!("expected final event, got {:?}", other),
        }
    }

    #[test]
    fn decodes_intermediate_frame_with_step_and_sigma() {
        let event = decode_frame(&intermediate_payload(0, 7, 3.5)).unwrap();
        match event {
            StreamEvent::Intermediate {
                step_ix,
                sigma,
                gen_id,
                image,
                ..
            } => {
                assert_eq!(step_ix, 7);
                assert_eq!(sigma, 3.5);
                assert_eq!(gen_id, "abc123");
                assert!(image.filename.ends_with("_step_07.jpg"));
            }
            other => panic!("expected intermediate event, got {:?}", other),
        }
    }

    #[test]
    fn frame_without_event_type_is_rejected() {
        let payload = encode(value_map(vec![
            ("samp_ix", Value::from(0u32)),
            ("gen_id", Value::from(1u32)),
            ("image", Value::Binary(PNG.to_vec())),
        ]));
        assert!(decode_frame(&payload).is_err());
    }

    #[test]
    fn frame_with_unknown_image_signature_is_rejected() {
        let payload = encode(value_map(vec![
            ("event_type", Value::from("final")),
            ("samp_ix", Value::from(0u32)),
            ("gen_id", Value::from(1u32)),
            ("image", Value::Binary(b"GIF89a".to_vec())),
        ]));
        assert!(matches!(
            decode_frame(&payload),
            Err(Error::ImageProcessing(_))
        ));
    }

    #[test]
    fn unknown_event_type_is_skipped_without_losing_sync() {
        let unknown = encode(value_map(vec![
            ("event_type", Value::from("preview")),
            ("samp_ix", Value::from(0u32)),
            ("gen_id", Value::from(1u32)),
            ("image", Value::Binary(PNG.to_vec())),
        ]));
        assert!(matches!(decode_frame(&unknown), Err(Error::Decode(_))));

        let mut data = frame(&unknown);
        data.extend(frame(&final_payload(0, 9)));
        let mut parser = StreamEventParser::new();
        let events = parser.feed_chunk(&data);
        assert_eq!(events.len(), 1);
        assert!(events[0].is_final());
    }

    #[test]
    fn non_map_frame_is_rejected() {
        assert!(decode_frame(&encode(Value::from("not a map"))).is_err());
        assert!(decode_frame(b"\xff\xff\xff").is_err());
    }

    fn two_frame_stream() -> Vec<u8> {
        let mut data = frame(&intermediate_payload(0, 1, 10.0));
        data.extend(frame(&final_payload(0, 42)));
        data
    }

    #[test]
    fn single_feed_yields_all_events_in_order() {
        let mut parser = StreamEventParser::new();
        let events = parser.feed_chunk(&two_frame_stream());
        assert_eq!(events.len(), 2);
        assert!(!events[0].is_final());
        assert!(events[1].is_final());
    }

    // Timestamped filenames make whole events unstable to compare; the
    // identity of an event is its kind, indices and payload.
    fn fingerprint(events: &[StreamEvent]) -> Vec<(bool, u32, Vec<u8>)> {
        events
            .iter()
            .map(|e| (e.is_final(), e.samp_ix(), e.image().data.clone()))
            .collect()
    }

    #[test]
    fn byte_at_a_time_feeding_matches_single_feed() {
        let data = two_frame_stream();

        let mut whole = StreamEventParser::new();
        let expected = whole.feed_chunk(&data);

        let mut split = StreamEventParser::new();
        let mut collected = Vec::new();
        for byte in &data {
            collected.extend(split.feed_chunk(std::slice::from_ref(byte)));
        }
        assert_eq!(fingerprint(&collected), fingerprint(&expected));
    }

    #[test]
    fn chunk_boundary_inside_length_prefix() {
        let data = two_frame_stream();
        let mut parser = StreamEventParser::new();
        let mut events = parser.feed_chunk(&data[..2]);
        events.extend(parser.feed_chunk(&data[2..]));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn no_event_emitted_twice() {
        let data = two_frame_stream();
        let mut parser = StreamEventParser::new();
        let mut total = 0;
        for chunk in data.chunks(5) {
            total += parser.feed_chunk(chunk).len();
        }
        total += parser.feed_chunk(&[]).len();
        assert_eq!(total, 2);
    }

    #[test]
    fn corrupt_frame_is_skipped_without_losing_sync() {
        let bad_payload = encode(value_map(vec![
            ("samp_ix", Value::from(0u32)),
            ("image", Value::Binary(PNG.to_vec())),
        ]));
        let mut data = frame(&bad_payload);
        data.extend(frame(&final_payload(1, 7)));

        let mut parser = StreamEventParser::new();
        let events = parser.feed_chunk(&data);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].samp_ix(), 1);
        assert!(events[0].is_final());
    }

    #[test]
    fn batch_walk_matches_incremental() {
        let data = two_frame_stream();
        let batch = parse_event_stream(&data).unwrap();
        let mut parser = StreamEventParser::new();
        assert_eq!(fingerprint(&parser.feed_chunk(&data)), fingerprint(&batch));
    }

    #[test]
    fn batch_tolerates_truncated_tail() {
        let mut data = two_frame_stream();
        data.extend(&1000u32.to_be_bytes());
        data.extend(b"only a few payload bytes");
        let events = parse_event_stream(&data).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn empty_response_is_fatal() {
        assert!(parse_event_stream(&[]).is_err());
        assert!(final_images(&[]).is_err());
    }

    #[test]
    fn final_images_filters_intermediates() {
        let mut data = frame(&intermediate_payload(0, 1, 9.0));
        data.extend(frame(&intermediate_payload(0, 2, 5.0)));
        data.extend(frame(&final_payload(0, 5)));
        let images = final_images(&data).unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].data, PNG);
    }
}
