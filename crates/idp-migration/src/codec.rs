use std::borrow::Cow;

use heed::BoxedError;
use roaring::RoaringBitmap;

/// Same codec pair as `idp_store::codec`, duplicated here because the
/// Migration store is a separate `heed::Env` with its own connection alias
/// (spec.md §5 "two connection aliases") and shares no types with it.
pub type BEU32 = heed::types::U32<byteorder::BigEndian>;

pub struct RoaringBitmapCodec;

impl<'a> heed::BytesEncode<'a> for RoaringBitmapCodec {
    type EItem = RoaringBitmap;

    fn bytes_encode(item: &'a RoaringBitmap) -> Result<Cow<'a, [u8]>, BoxedError> {
        let mut bytes = Vec::with_capacity(item.serialized_size());
        item.serialize_into(&mut bytes)?;
        Ok(Cow::Owned(bytes))
    }
}

impl<'a> heed::BytesDecode<'a> for RoaringBitmapCodec {
    type DItem = RoaringBitmap;

    fn bytes_decode(bytes: &'a [u8]) -> Result<RoaringBitmap, BoxedError> {
        Ok(RoaringBitmap::deserialize_from(bytes)?)
    }
}
