//! A minimal ICC v2 display profile for linear sRGB: sRGB primaries
//! adapted to D50, identity tone curves.

/// TIFF tag carrying an embedded ICC profile.
pub const TIFF_ICC_TAG: u16 = 34675;

const HEADER_LEN: usize = 128;
const DESCRIPTION: &str = "Linear sRGB";
const COPYRIGHT: &str = "No copyright, use freely";

/// D50 illuminant, the profile connection space white.
const D50: [f64; 3] = [0.9642, 1.0, 0.8249];

/// Bradford-adapted sRGB primaries.
const RED: [f64; 3] = [0.436_074_7, 0.222_504_5, 0.013_932_2];
const GREEN: [f64; 3] = [0.385_064_9, 0.716_878_6, 0.097_104_5];
const BLUE: [f64; 3] = [0.143_080_4, 0.060_616_9, 0.714_173_3];

fn s15_fixed16(value: f64) -> [u8; 4] {
    ((value * 65536.0).round() as i32).to_be_bytes()
}

fn xyz_type(xyz: [f64; 3]) -> Vec<u8> {
    let mut data = b"XYZ \0\0\0\0".to_vec();
    for v in xyz {
        data.extend_from_slice(&s15_fixed16(v));
    }
    data
}

/// `curv` with no entries: the identity curve.
fn linear_curve() -> Vec<u8> {
    let mut data = b"curv\0\0\0\0".to_vec();
    data.extend_from_slice(&0u32.to_be_bytes());
    data
}

fn text_type(text: &str) -> Vec<u8> {
    let mut data = b"text\0\0\0\0".to_vec();
    data.extend_from_slice(text.as_bytes());
    data.push(0);
    data
}

fn description_type(text: &str) -> Vec<u8> {
    let mut data = b"desc\0\0\0\0".to_vec();
    data.extend_from_slice(&(text.len() as u32 + 1).to_be_bytes());
    data.extend_from_slice(text.as_bytes());
    data.push(0);
    // Empty Unicode and ScriptCode descriptions.
    data.extend_from_slice(&[0; 8]);
    data.extend_from_slice(&[0; 3]);
    data.extend_from_slice(&[0; 67]);
    data
}

/// Serialized profile bytes, ready to embed.
pub fn linear_srgb_profile() -> Vec<u8> {
    // Tags sharing a signature's data point at the same offset.
    let blocks: Vec<(&[u8; 4], usize)> = vec![
        (b"desc", 0),
        (b"cprt", 1),
        (b"wtpt", 2),
        (b"rXYZ", 3),
        (b"gXYZ", 4),
        (b"bXYZ", 5),
        (b"rTRC", 6),
        (b"gTRC", 6),
        (b"bTRC", 6),
    ];
    let data = [
        description_type(DESCRIPTION),
        text_type(COPYRIGHT),
        xyz_type(D50),
        xyz_type(RED),
        xyz_type(GREEN),
        xyz_type(BLUE),
        linear_curve(),
    ];

    let table_len = 4 + 12 * blocks.len();
    let mut offsets = Vec::with_capacity(data.len());
    let mut cursor = HEADER_LEN + table_len;
    for block in &data {
        offsets.push(cursor);
        cursor = (cursor + block.len()).next_multiple_of(4);
    }
    let total = cursor;

    let mut profile = Vec::with_capacity(total);
    profile.extend_from_slice(&(total as u32).to_be_bytes());
    profile.extend_from_slice(&[0; 4]); // preferred CMM
    profile.extend_from_slice(&0x0210_0000u32.to_be_bytes());
    profile.extend_from_slice(b"mntr");
    profile.extend_from_slice(b"RGB ");
    profile.extend_from_slice(b"XYZ ");
    profile.extend_from_slice(&[0; 12]); // creation date
    profile.extend_from_slice(b"acsp");
    profile.extend_from_slice(&[0; 24]); // platform, flags, device, attributes
    profile.extend_from_slice(&0u32.to_be_bytes()); // perceptual intent
    for v in D50 {
        profile.extend_from_slice(&s15_fixed16(v));
    }
    profile.resize(HEADER_LEN, 0);

    profile.extend_from_slice(&(blocks.len() as u32).to_be_bytes());
    for (signature, index) in &blocks {
        profile.extend_from_slice(*signature);
        profile.extend_from_slice(&(offsets[*index] as u32).to_be_bytes());
        profile.extend_from_slice(&(data[*index].len() as u32).to_be_bytes());
    }
    for (block, offset) in data.iter().zip(&offsets) {
        profile.resize(*offset, 0);
        profile.extend_from_slice(block);
    }
    profile.resize(total, 0);
    profile
}
