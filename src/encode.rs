use crate::BencodeType;

/// Encode [`BencodeType`] to canonical bencode bytes
pub fn encode(data: &BencodeType) -> Vec<u8> {
    let mut output = Vec::new();
    encode_into(data, &mut output);
    output
}

fn encode_into(data: &BencodeType, output: &mut Vec<u8>) {
    match data {
        BencodeType::Integer(int) => output.extend_from_slice(format!("i{}e", int).as_bytes()),
        BencodeType::ByteString(bytes) => encode_byte_string(bytes, output),
        BencodeType::List(items) => {
            output.push(b'l');
            for item in items {
                encode_into(item, output);
            }
            output.push(b'e');
        }
        BencodeType::Dict(dict) => {
            // BTreeMap iterates keys in ascending byte order
            output.push(b'd');
            for (key, value) in dict {
                encode_byte_string(key, output);
                encode_into(value, output);
            }
            output.push(b'e');
        }
    }
}

fn encode_byte_string(bytes: &[u8], output: &mut Vec<u8>) {
    output.extend_from_slice(bytes.len().to_string().as_bytes());
    output.push(b':');
    output.extend_from_slice(bytes);
}
