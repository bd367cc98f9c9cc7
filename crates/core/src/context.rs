use crate::id::{LanguageId, ShopId};

/// Shop and language scope of a request.
///
/// Passed explicitly into every read operation; nothing in the domain looks up a current
/// shop or language on its own.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RequestContext {
    shop_id: ShopId,
    language_id: LanguageId,
}

impl RequestContext {
    pub fn new(shop_id: ShopId, language_id: LanguageId) -> Self {
        Self {
            shop_id,
            language_id,
        }
    }

    pub fn shop_id(&self) -> ShopId {
        self.shop_id
    }

    pub fn language_id(&self) -> LanguageId {
        self.language_id
    }
}
