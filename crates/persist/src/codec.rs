use vectormap_camera::CameraSnapshot;

use crate::store::PersistError;

pub fn to_json(snapshot: &CameraSnapshot) -> Result<String, PersistError> {
    Ok(serde_json::to_string(snapshot)?)
}

pub fn from_json(text: &str) -> Result<CameraSnapshot, PersistError> {
    Ok(serde_json::from_str(text)?)
}

pub fn to_cbor(snapshot: &CameraSnapshot) -> Result<Vec<u8>, PersistError> {
    let mut buf = Vec::new();
    ciborium::into_writer(snapshot, &mut buf)
        .map_err(|e| PersistError::CborEncode(e.to_string()))?;
    Ok(buf)
}

pub fn from_cbor(data: &[u8]) -> Result<CameraSnapshot, PersistError> {
    ciborium::from_reader(data).map_err(|e| PersistError::CborDecode(e.to_string()))
}
