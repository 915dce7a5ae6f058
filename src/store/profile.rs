use super::{Phase, Store};
use crate::models::{CreateProfileRequest, Profile, UpdateProfileRequest};
use crate::services::{ApiError, CatalogKey};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileState {
    pub profile: Option<Profile>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub search_results: Vec<Profile>,
    pub search_loading: bool,
    pub available_avatars: Vec<String>,
    pub available_interest_tags: Vec<String>,
    pub avatars_loading: bool,
    pub tags_loading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileAction {
    CreateProfile(Phase<Profile>),
    FetchProfile(Phase<Profile>),
    UpdateProfile(Phase<Profile>),
    SearchProfiles(Phase<Vec<Profile>>),
    FetchAvatars(Phase<Vec<String>>),
    FetchInterestTags(Phase<Vec<String>>),
    ClearError,
    ClearSearchResults,
}

impl ProfileState {
    pub fn reduce(&mut self, action: ProfileAction) {
        match action {
            ProfileAction::CreateProfile(phase)
            | ProfileAction::FetchProfile(phase)
            | ProfileAction::UpdateProfile(phase) => match phase {
                Phase::Pending => {
                    self.is_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(profile) => {
                    self.is_loading = false;
                    self.profile = Some(profile);
                }
                Phase::Rejected(message) => {
                    self.is_loading = false;
                    self.error = Some(message);
                }
            },
            ProfileAction::SearchProfiles(phase) => match phase {
                Phase::Pending => {
                    self.search_loading = true;
                    self.error = None;
                }
                Phase::Fulfilled(results) => {
                    self.search_loading = false;
                    self.search_results = results;
                }
                Phase::Rejected(message) => {
                    self.search_loading = false;
                    self.error = Some(message);
                }
            },
            // Catalog loads run alongside other requests and leave `error` alone until they fail
            ProfileAction::FetchAvatars(phase) => match phase {
                Phase::Pending => self.avatars_loading = true,
                Phase::Fulfilled(avatars) => {
                    self.avatars_loading = false;
                    self.available_avatars = avatars;
                }
                Phase::Rejected(message) => {
                    self.avatars_loading = false;
                    self.error = Some(message);
                }
            },
            ProfileAction::FetchInterestTags(phase) => match phase {
                Phase::Pending => self.tags_loading = true,
                Phase::Fulfilled(tags) => {
                    self.tags_loading = false;
                    self.available_interest_tags = tags;
                }
                Phase::Rejected(message) => {
                    self.tags_loading = false;
                    self.error = Some(message);
                }
            },
            ProfileAction::ClearError => self.error = None,
            ProfileAction::ClearSearchResults => self.search_results.clear(),
        }
    }
}

impl Store {
    pub async fn create_profile(&self, request: &CreateProfileRequest) -> Result<Profile, ApiError> {
        self.track(ProfileAction::CreateProfile, self.api.create_profile(request))
            .await
    }

    pub async fn fetch_profile(&self) -> Result<Profile, ApiError> {
        self.track(ProfileAction::FetchProfile, self.api.get_profile())
            .await
    }

    pub async fn update_profile(&self, request: &UpdateProfileRequest) -> Result<Profile, ApiError> {
        self.track(ProfileAction::UpdateProfile, self.api.update_profile(request))
            .await
    }

    pub async fn search_profiles(&self, query: &str) -> Result<Vec<Profile>, ApiError> {
        self.track(ProfileAction::SearchProfiles, self.api.search_profiles(query))
            .await
    }

    pub async fn fetch_available_avatars(&self) -> Result<Vec<String>, ApiError> {
        let fetch = self
            .catalogs
            .get_or_fetch(CatalogKey::AVATARS, || self.api.get_available_avatars());
        self.track(ProfileAction::FetchAvatars, fetch).await
    }

    pub async fn fetch_available_interest_tags(&self) -> Result<Vec<String>, ApiError> {
        let fetch = self
            .catalogs
            .get_or_fetch(CatalogKey::INTEREST_TAGS, || self.api.get_available_interest_tags());
        self.track(ProfileAction::FetchInterestTags, fetch).await
    }
}
