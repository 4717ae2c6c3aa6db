use serde_json::Value;

use grove_common::{
    api::{
        page_bounds, ApiResponse, CancelListingParams, GetListingParams, GetTradeHistoryParams,
        GroveParams, Page, PageParams, PurchaseFromMarketplaceParams, SellerParams,
        ListTokensForSaleParams, UpdateListingParams,
    },
    types::{Listing, ListingId, MarketplaceStats, PurchaseResult, Trade},
};

use super::{handle, to_json, GroveApi};
use crate::{async_handler, core::storage::Storage};

pub fn register_methods<S: Storage>(api: &mut GroveApi<S>) {
    api.register_method("listTokensForSale", async_handler!(list_tokens_for_sale::<S>));
    api.register_method("cancelListing", async_handler!(cancel_listing::<S>));
    api.register_method("updateListing", async_handler!(update_listing::<S>));
    api.register_method(
        "purchaseFromMarketplace",
        async_handler!(purchase_from_marketplace::<S>),
    );
    api.register_method("getListing", async_handler!(get_listing::<S>));
    api.register_method("getActiveListings", async_handler!(get_active_listings::<S>));
    api.register_method(
        "getListingsForGrove",
        async_handler!(get_listings_for_grove::<S>),
    );
    api.register_method("getUserListings", async_handler!(get_user_listings::<S>));
    api.register_method("getTradeHistory", async_handler!(get_trade_history::<S>));
    api.register_method(
        "getTradesForListing",
        async_handler!(get_trades_for_listing::<S>),
    );
    api.register_method(
        "getMarketplaceStats",
        async_handler!(get_marketplace_stats::<S>),
    );
    api.register_method("sweepExpired", async_handler!(sweep_expired::<S>));
}

impl<S: Storage> GroveApi<S> {
    pub async fn list_tokens_for_sale(&self, params: ListTokensForSaleParams) -> ApiResponse<Listing> {
        self.engine
            .list_tokens_for_sale(
                &params.caller,
                &params.grove_id,
                params.amount,
                params.price_per_token,
                params.duration_days,
            )
            .await
            .into()
    }

    pub async fn cancel_listing(&self, params: CancelListingParams) -> ApiResponse<Listing> {
        self.engine
            .cancel_listing(&params.caller, params.listing_id)
            .await
            .into()
    }

    pub async fn update_listing(&self, params: UpdateListingParams) -> ApiResponse<Listing> {
        self.engine
            .update_listing(
                &params.caller,
                params.listing_id,
                params.new_price,
                params.new_duration_days,
            )
            .await
            .into()
    }

    pub async fn purchase_from_marketplace(
        &self,
        params: PurchaseFromMarketplaceParams,
    ) -> ApiResponse<PurchaseResult> {
        self.engine
            .purchase_from_marketplace(&params.caller, params.listing_id, params.amount)
            .await
            .into()
    }

    pub async fn get_listing(&self, params: GetListingParams) -> ApiResponse<Listing> {
        self.engine.get_listing(params.listing_id).await.into()
    }

    pub async fn get_active_listings(&self, params: PageParams) -> ApiResponse<Page<Listing>> {
        let (offset, limit) = page_bounds(params.offset, params.limit);
        self.engine.get_active_listings(offset, limit).await.into()
    }

    pub async fn get_listings_for_grove(&self, params: GroveParams) -> ApiResponse<Vec<Listing>> {
        self.engine
            .get_listings_for_grove(&params.grove_id)
            .await
            .into()
    }

    pub async fn get_user_listings(&self, params: SellerParams) -> ApiResponse<Vec<Listing>> {
        self.engine.get_user_listings(&params.seller).await.into()
    }

    pub async fn get_trade_history(&self, params: GetTradeHistoryParams) -> ApiResponse<Page<Trade>> {
        let (offset, limit) = page_bounds(params.offset, params.limit);
        self.engine
            .get_trade_history(params.user.as_ref(), offset, limit)
            .await
            .into()
    }

    pub async fn get_trades_for_listing(&self, params: GetListingParams) -> ApiResponse<Vec<Trade>> {
        self.engine
            .get_trades_for_listing(params.listing_id)
            .await
            .into()
    }

    pub async fn get_marketplace_stats(&self) -> ApiResponse<MarketplaceStats> {
        self.engine.get_marketplace_stats().await.into()
    }

    pub async fn sweep_expired(&self) -> ApiResponse<Vec<ListingId>> {
        self.engine.sweep_expired().await.into()
    }
}

async fn list_tokens_for_sale<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.list_tokens_for_sale(params)).await
}

async fn cancel_listing<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.cancel_listing(params)).await
}

async fn update_listing<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.update_listing(params)).await
}

async fn purchase_from_marketplace<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.purchase_from_marketplace(params)).await
}

async fn get_listing<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_listing(params)).await
}

async fn get_active_listings<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_active_listings(params)).await
}

async fn get_listings_for_grove<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_listings_for_grove(params)).await
}

async fn get_user_listings<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_user_listings(params)).await
}

async fn get_trade_history<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_trade_history(params)).await
}

async fn get_trades_for_listing<S: Storage>(api: &GroveApi<S>, body: Value) -> ApiResponse<Value> {
    handle(body, move |params| api.get_trades_for_listing(params)).await
}

async fn get_marketplace_stats<S: Storage>(api: &GroveApi<S>, _: Value) -> ApiResponse<Value> {
    to_json(api.get_marketplace_stats().await)
}

async fn sweep_expired<S: Storage>(api: &GroveApi<S>, _: Value) -> ApiResponse<Value> {
    to_json(api.sweep_expired().await)
}
