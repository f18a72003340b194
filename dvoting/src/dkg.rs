// The DKG publishes each form's aggregate public key into the global state
// before the form is opened. The contract only ever reads it.

use crate::*;

/// Key of the DKG public key of a form: SHA256("DkgPublicKey" || form_id)
pub fn dkg_public_key_key(form_id: &str) -> [u8; 32] {
    let mut data = b"DkgPublicKey".to_vec();
    data.extend_from_slice(form_id.as_bytes());
    sha256(&data)
}

pub fn publish_dkg_public_key(
    snapshot: &mut dyn Snapshot,
    form_id: &str,
    public_key: &Point,
) -> Result<(), Error> {
    snapshot.set(&dkg_public_key_key(form_id), serde_json::to_vec(public_key)?)?;
    Ok(())
}

/// The published key, if the DKG finished its setup for this form
pub fn load_dkg_public_key(snapshot: &dyn Snapshot, form_id: &str) -> Result<Option<Point>, Error> {
    match snapshot.get(&dkg_public_key_key(form_id))? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_and_load() {
        let mut snapshot = MemSnapshot::default();
        assert_eq!(load_dkg_public_key(&snapshot, "aa").unwrap(), None);

        publish_dkg_public_key(&mut snapshot, "aa", &Point::base()).unwrap();
        assert_eq!(
            load_dkg_public_key(&snapshot, "aa").unwrap(),
            Some(Point::base())
        );
        assert_eq!(load_dkg_public_key(&snapshot, "bb").unwrap(), None);
    }
}
