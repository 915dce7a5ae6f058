// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ChatMessage, CompatibilityMatch, GameCoinTransaction, GameExperience, LobbyParticipant,
    MatchDetails, MessageType, Opponent, PrivateLobby, Profile, ProfileRecommendation, Room,
    RoomParticipant, TransactionType,
};
pub use requests::{
    CreateProfileRequest, CreateRoomRequest, JoinQueueRequest, RefreshTokenRequest,
    SendMessageRequest, SendOtpRequest, SpendCoinsRequest, UpdateProfileRequest, VerifyOtpRequest,
};
pub use responses::{
    ApiEnvelope, AuthTokens, BalanceResponse, CompatibilityScoreResponse, DailyBonusResponse,
    ErrorResponse, MatchResult, QueueStatusResponse, QueueTimeout, SpendCoinsResponse,
    StartGameResponse,
};
