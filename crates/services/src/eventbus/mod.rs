pub mod bus;
pub mod redis;
pub mod router;
pub mod rpc;

pub use bus::{BusError, RpcPublisher, RpcSubscriber, ServerMessage, Subscription};
pub use redis::RedisBus;
pub use router::{Router, SignalingHandler};
pub use rpc::{
    IceCandidateParams, Method, Rpc, RpcError, SdpParams, SignalingTarget, SubscribeParams,
};
