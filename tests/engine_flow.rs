#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use fitlab::api::{ApiError, TryOnBackend};
    use fitlab::models::{
        PhotoKind, RemotePhoto, ResultRecord, TryOnReceipt, TryOnRequest, UploadReceipt,
        UserProfile,
    };
    use fitlab::session::SessionStore;
    use fitlab::shop;
    use fitlab::{AuthError, Selection, Studio, TryOnError, UploadError};

    /// Scriptable in-memory backend standing in for the HTTP client.
    /// Upload ids, the try-on response, and the poll results are fixed
    /// per test; call counters record what the engine actually did.
    struct FakeBackend {
        profile: UserProfile,
        person_upload_id: i64,
        garment_upload_id: i64,
        receipt: TryOnReceipt,
        shop_listing: Vec<RemotePhoto>,
        poll_record: Option<ResultRecord>,
        results_ready_after: u32,
        tryon_gate: Option<Arc<Notify>>,
        upload_gate: Option<Arc<Notify>>,
        fail_uploads: AtomicBool,
        fail_image_fetch: bool,
        upload_calls: AtomicU32,
        tryon_calls: AtomicU32,
        list_results_calls: AtomicU32,
        get_result_calls: AtomicU32,
        profile_calls: AtomicU32,
        last_request: Mutex<Option<TryOnRequest>>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                profile: UserProfile {
                    id: 9,
                    email: Some("ada@example.com".to_string()),
                    username: None,
                    name: None,
                    profile_image_url: None,
                    credits: Some(12),
                },
                person_upload_id: 7,
                garment_upload_id: 42,
                receipt: TryOnReceipt {
                    result_filename: Some("r1.png".to_string()),
                    result_url: None,
                    result_id: None,
                },
                shop_listing: Vec::new(),
                poll_record: None,
                results_ready_after: 0,
                tryon_gate: None,
                upload_gate: None,
                fail_uploads: AtomicBool::new(false),
                fail_image_fetch: false,
                upload_calls: AtomicU32::new(0),
                tryon_calls: AtomicU32::new(0),
                list_results_calls: AtomicU32::new(0),
                get_result_calls: AtomicU32::new(0),
                profile_calls: AtomicU32::new(0),
                last_request: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl TryOnBackend for FakeBackend {
        async fn fetch_profile(&self, _token: &str) -> Result<UserProfile, ApiError> {
            self.profile_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.profile.clone())
        }

        async fn upload_photo(
            &self,
            kind: PhotoKind,
            filename: &str,
            bytes: Vec<u8>,
            _mime: &str,
            _token: &str,
        ) -> Result<UploadReceipt, ApiError> {
            self.upload_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.upload_gate {
                gate.notified().await;
            }
            if self.fail_uploads.load(Ordering::SeqCst) {
                return Err(ApiError::Status {
                    status: 500,
                    body: "upload exploded".to_string(),
                });
            }
            assert!(!bytes.is_empty(), "engine must never upload an empty body");
            let id = match kind {
                PhotoKind::Person => self.person_upload_id,
                PhotoKind::Garment => self.garment_upload_id,
            };
            Ok(UploadReceipt {
                id,
                filename: Some(filename.to_string()),
                url: None,
            })
        }

        async fn list_photos(
            &self,
            _kind: PhotoKind,
            _token: &str,
        ) -> Result<Vec<RemotePhoto>, ApiError> {
            Ok(Vec::new())
        }

        async fn shop_clothes(&self) -> Result<Vec<RemotePhoto>, ApiError> {
            Ok(self.shop_listing.clone())
        }

        async fn delete_photo(
            &self,
            _kind: PhotoKind,
            _id: i64,
            _token: &str,
        ) -> Result<(), ApiError> {
            Ok(())
        }

        async fn request_tryon(
            &self,
            request: &TryOnRequest,
            _token: &str,
        ) -> Result<TryOnReceipt, ApiError> {
            self.tryon_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());
            if let Some(gate) = &self.tryon_gate {
                gate.notified().await;
            }
            Ok(self.receipt.clone())
        }

        async fn list_results(
            &self,
            _user_id: i64,
            _token: &str,
        ) -> Result<Vec<ResultRecord>, ApiError> {
            let call = self.list_results_calls.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.poll_record {
                Some(record) if call >= self.results_ready_after => Ok(vec![record.clone()]),
                _ => Ok(Vec::new()),
            }
        }

        async fn get_result(
            &self,
            _user_id: i64,
            _result_id: i64,
            _token: &str,
        ) -> Result<ResultRecord, ApiError> {
            let call = self.get_result_calls.fetch_add(1, Ordering::SeqCst) + 1;
            match &self.poll_record {
                Some(record) if call >= self.results_ready_after => Ok(record.clone()),
                _ => Err(ApiError::Status {
                    status: 404,
                    body: "not ready".to_string(),
                }),
            }
        }

        async fn fetch_image(&self, _url: &str) -> Result<Vec<u8>, ApiError> {
            if self.fail_image_fetch {
                return Err(ApiError::Status {
                    status: 502,
                    body: "cdn unavailable".to_string(),
                });
            }
            Ok(jpeg_bytes())
        }

        fn result_image_url(&self, filename: &str) -> String {
            format!("https://api.test/results/image/{}", filename)
        }
    }

    /// Smallest payload that passes the client-side JPEG checks
    fn jpeg_bytes() -> Vec<u8> {
        vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0xFF, 0xD9]
    }

    async fn logged_in_studio(backend: Arc<FakeBackend>) -> Studio {
        let studio = Studio::new(backend, SessionStore::in_memory());
        studio
            .login_with_token("tok-test".to_string())
            .await
            .unwrap();
        studio
    }

    async fn upload_both(studio: &Studio) {
        studio
            .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
        studio
            .upload_photo(PhotoKind::Garment, "tee.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_full_flow_records_one_history_entry() {
        let backend = Arc::new(FakeBackend::new());
        let studio = logged_in_studio(backend.clone()).await;

        // 1. Upload a person photo, then a garment photo
        let person = studio
            .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
        assert_eq!(person.id, 7);
        assert_eq!(studio.wardrobe(PhotoKind::Person).selected_id(), Some(7));

        let garment = studio
            .upload_photo(PhotoKind::Garment, "tee.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
        assert_eq!(garment.id, 42);
        assert_eq!(studio.wardrobe(PhotoKind::Garment).selected_id(), Some(42));

        // 2. Generate a try-on
        let entry = studio.generate().await.unwrap();
        assert_eq!(entry.result_filename, "r1.png");
        assert_eq!(entry.result_url, "https://api.test/results/image/r1.png");
        assert_eq!(entry.person_preview, "me.jpg");
        assert_eq!(entry.garment_preview, "tee.jpg");

        // 3. Exactly one request went out, carrying the selected ids
        assert_eq!(backend.tryon_calls.load(Ordering::SeqCst), 1);
        let request = backend.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(request.user_id, 9);
        assert_eq!(request.person_photo_id, 7);
        assert_eq!(request.cloth_photo_id, 42);

        // 4. History holds the one entry; selections survive for reuse
        assert_eq!(studio.history().len(), 1);
        assert_eq!(studio.wardrobe(PhotoKind::Person).selected_id(), Some(7));
        assert_eq!(studio.wardrobe(PhotoKind::Garment).selected_id(), Some(42));
        assert!(!studio.is_generating());
    }

    #[tokio::test]
    async fn test_nothing_happens_without_a_login() {
        let backend = Arc::new(FakeBackend::new());
        let studio = Studio::new(backend.clone(), SessionStore::in_memory());

        let upload = studio
            .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
            .await;
        assert!(matches!(upload, Err(UploadError::NotLoggedIn)));

        let generate = studio.generate().await;
        assert!(matches!(generate, Err(TryOnError::NotLoggedIn)));

        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 0);
        assert_eq!(backend.tryon_calls.load(Ordering::SeqCst), 0);
        assert!(studio.history().is_empty());
    }

    #[tokio::test]
    async fn test_generate_requires_both_selections() {
        let backend = Arc::new(FakeBackend::new());
        let studio = logged_in_studio(backend.clone()).await;

        let missing_person = studio.generate().await;
        assert!(matches!(missing_person, Err(TryOnError::NoPersonSelected)));

        studio
            .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
        let missing_garment = studio.generate().await;
        assert!(matches!(
            missing_garment,
            Err(TryOnError::NoGarmentSelected)
        ));

        assert_eq!(backend.tryon_calls.load(Ordering::SeqCst), 0);
        assert!(studio.history().is_empty());
    }

    #[tokio::test]
    async fn test_failed_upload_leaves_the_wardrobe_unchanged() {
        let backend = Arc::new(FakeBackend::new());
        let studio = logged_in_studio(backend.clone()).await;

        studio
            .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
            .await
            .unwrap();

        backend.fail_uploads.store(true, Ordering::SeqCst);
        let failed = studio
            .upload_photo(PhotoKind::Person, "retry.jpg", jpeg_bytes(), None)
            .await;
        assert!(matches!(failed, Err(UploadError::Api(_))));

        // No phantom photo, and the earlier selection is restored
        let wardrobe = studio.wardrobe(PhotoKind::Person);
        assert_eq!(wardrobe.available().len(), 1);
        assert_eq!(wardrobe.selected_id(), Some(7));
    }

    #[tokio::test]
    async fn test_overlapping_uploads_of_one_kind_are_refused() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new();
        backend.upload_gate = Some(gate.clone());
        let backend = Arc::new(backend);

        let studio = Arc::new(logged_in_studio(backend.clone()).await);

        // 1. Park the first upload inside the backend call
        let first = {
            let studio = studio.clone();
            tokio::spawn(async move {
                studio
                    .upload_photo(PhotoKind::Person, "me.jpg", jpeg_bytes(), None)
                    .await
            })
        };
        while backend.upload_calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(
            studio.wardrobe(PhotoKind::Person).selection(),
            Selection::Uploading
        );

        // 2. A second upload of the same kind is refused without
        //    reaching the backend
        let second = studio
            .upload_photo(PhotoKind::Person, "retry.jpg", jpeg_bytes(), None)
            .await;
        assert!(matches!(
            second,
            Err(UploadError::InProgress { kind: "person" })
        ));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);

        // 3. Release the first one; it completes and selects its photo
        gate.notify_one();
        let photo = first.await.unwrap().unwrap();
        assert_eq!(photo.id, 7);
        let wardrobe = studio.wardrobe(PhotoKind::Person);
        assert_eq!(wardrobe.selected_id(), Some(7));
        assert_eq!(wardrobe.available().len(), 1);
    }

    #[tokio::test]
    async fn test_result_url_from_the_response_wins() {
        let mut backend = FakeBackend::new();
        backend.receipt = TryOnReceipt {
            result_filename: None,
            result_url: Some("https://cdn.example.com/out/fit-9.png".to_string()),
            result_id: None,
        };
        let backend = Arc::new(backend);
        let studio = logged_in_studio(backend.clone()).await;
        upload_both(&studio).await;

        let entry = studio.generate().await.unwrap();
        assert_eq!(entry.result_url, "https://cdn.example.com/out/fit-9.png");
        assert_eq!(entry.result_filename, "fit-9.png");
        // The ready URL short-circuits the polling fallback
        assert_eq!(backend.list_results_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlapping_generates_are_refused() {
        let gate = Arc::new(Notify::new());
        let mut backend = FakeBackend::new();
        backend.tryon_gate = Some(gate.clone());
        let backend = Arc::new(backend);

        let studio = Arc::new(logged_in_studio(backend.clone()).await);
        upload_both(&studio).await;

        // 1. Park the first generation inside the backend call
        let first = {
            let studio = studio.clone();
            tokio::spawn(async move { studio.generate().await })
        };
        while !studio.is_generating() {
            tokio::task::yield_now().await;
        }

        // 2. A second generation is refused while the first is in flight
        let second = studio.generate().await;
        assert!(matches!(second, Err(TryOnError::Busy)));

        // 3. Release the first one; it completes normally
        gate.notify_one();
        let entry = first.await.unwrap().unwrap();
        assert_eq!(entry.result_filename, "r1.png");

        assert_eq!(backend.tryon_calls.load(Ordering::SeqCst), 1);
        assert_eq!(studio.history().len(), 1);
        assert!(!studio.is_generating());
    }

    #[tokio::test]
    async fn test_poll_fallback_finds_the_result_in_the_listing() {
        let mut backend = FakeBackend::new();
        backend.receipt = TryOnReceipt {
            result_filename: None,
            result_url: None,
            result_id: None,
        };
        backend.poll_record = Some(ResultRecord {
            id: Some(501),
            image_url: Some("https://api.test/results/image/late.png".to_string()),
            url: None,
            result_url: None,
            result_filename: None,
        });
        backend.results_ready_after = 3;
        let backend = Arc::new(backend);

        let studio = Studio::new(backend.clone(), SessionStore::in_memory())
            .with_poll(10, Duration::from_millis(1));
        studio
            .login_with_token("tok-test".to_string())
            .await
            .unwrap();
        upload_both(&studio).await;

        let entry = studio.generate().await.unwrap();
        assert_eq!(entry.result_filename, "late.png");
        assert_eq!(entry.result_url, "https://api.test/results/image/late.png");
        assert_eq!(backend.list_results_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_poll_gives_up_after_the_attempt_limit() {
        let mut backend = FakeBackend::new();
        backend.receipt = TryOnReceipt {
            result_filename: None,
            result_url: None,
            result_id: None,
        };
        let backend = Arc::new(backend);

        let studio = Studio::new(backend.clone(), SessionStore::in_memory())
            .with_poll(10, Duration::from_millis(1));
        studio
            .login_with_token("tok-test".to_string())
            .await
            .unwrap();
        upload_both(&studio).await;

        let outcome = studio.generate().await;
        assert!(matches!(
            outcome,
            Err(TryOnError::ResultNotReady { attempts: 10 })
        ));
        assert_eq!(backend.list_results_calls.load(Ordering::SeqCst), 10);
        assert!(studio.history().is_empty());
        // The in-flight guard is released even on failure
        assert!(!studio.is_generating());
    }

    #[tokio::test]
    async fn test_poll_looks_up_the_specific_result_when_given_an_id() {
        let mut backend = FakeBackend::new();
        backend.receipt = TryOnReceipt {
            result_filename: None,
            result_url: None,
            result_id: Some(77),
        };
        backend.poll_record = Some(ResultRecord {
            id: Some(77),
            image_url: Some("https://api.test/results/image/direct.png".to_string()),
            url: None,
            result_url: None,
            result_filename: Some("direct.png".to_string()),
        });
        backend.results_ready_after = 2;
        let backend = Arc::new(backend);

        let studio = Studio::new(backend.clone(), SessionStore::in_memory())
            .with_poll(10, Duration::from_millis(1));
        studio
            .login_with_token("tok-test".to_string())
            .await
            .unwrap();
        upload_both(&studio).await;

        let entry = studio.generate().await.unwrap();
        assert_eq!(entry.result_filename, "direct.png");
        assert_eq!(backend.get_result_calls.load(Ordering::SeqCst), 2);
        assert_eq!(backend.list_results_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_catalog_import_selects_the_uploaded_garment() {
        let mut backend = FakeBackend::new();
        backend.shop_listing = vec![RemotePhoto {
            id: 301,
            image_url: Some("https://cdn.test/shop/tee.png".to_string()),
            fitting_type: Some("upper_body".to_string()),
        }];
        let backend = Arc::new(backend);
        let studio = logged_in_studio(backend.clone()).await;

        let catalog = shop::fetch_catalog(backend.as_ref()).await.unwrap();
        let imported = studio.import_catalog_garment(&catalog[0]).await.unwrap();

        assert_eq!(imported.id, 42);
        assert_eq!(imported.preview, "https://cdn.test/shop/tee.png");
        assert_eq!(studio.wardrobe(PhotoKind::Garment).selected_id(), Some(42));
    }

    #[tokio::test]
    async fn test_failed_catalog_import_leaves_the_selection_alone() {
        let mut backend = FakeBackend::new();
        backend.fail_image_fetch = true;
        backend.shop_listing = vec![RemotePhoto {
            id: 301,
            image_url: Some("https://cdn.test/shop/tee.png".to_string()),
            fitting_type: None,
        }];
        let backend = Arc::new(backend);
        let studio = logged_in_studio(backend.clone()).await;

        studio
            .upload_photo(PhotoKind::Garment, "tee.jpg", jpeg_bytes(), None)
            .await
            .unwrap();
        let uploads_before = backend.upload_calls.load(Ordering::SeqCst);

        let catalog = shop::fetch_catalog(backend.as_ref()).await.unwrap();
        let imported = studio.import_catalog_garment(&catalog[0]).await;
        assert!(matches!(imported, Err(UploadError::Api(_))));

        assert_eq!(studio.wardrobe(PhotoKind::Garment).selected_id(), Some(42));
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), uploads_before);
    }

    #[tokio::test]
    async fn test_catalog_skips_records_without_an_image() {
        let mut backend = FakeBackend::new();
        backend.shop_listing = vec![
            RemotePhoto {
                id: 1,
                image_url: Some("https://cdn.test/shop/tee.png".to_string()),
                fitting_type: Some("upper_body".to_string()),
            },
            RemotePhoto {
                id: 2,
                image_url: None,
                fitting_type: Some("lower_body".to_string()),
            },
        ];
        let backend = Arc::new(backend);

        let catalog = shop::fetch_catalog(backend.as_ref()).await.unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog[0].id, 1);
    }

    #[tokio::test]
    async fn test_base64_uploads_are_decoded_or_rejected() {
        let backend = Arc::new(FakeBackend::new());
        let studio = logged_in_studio(backend.clone()).await;

        let encoded =
            base64::Engine::encode(&base64::engine::general_purpose::STANDARD, jpeg_bytes());
        let photo = studio
            .upload_photo_base64(PhotoKind::Person, "me.jpg", &encoded)
            .await
            .unwrap();
        assert_eq!(photo.id, 7);

        let rejected = studio
            .upload_photo_base64(PhotoKind::Person, "retry.jpg", "not-base64!!!")
            .await;
        assert!(matches!(rejected, Err(UploadError::InvalidPayload(_))));
        // Rejected before any network call; the earlier upload stays selected
        assert_eq!(backend.upload_calls.load(Ordering::SeqCst), 1);
        assert_eq!(studio.wardrobe(PhotoKind::Person).selected_id(), Some(7));
    }

    #[tokio::test]
    async fn test_restored_history_is_visible_and_extendable() {
        use fitlab::db::HistoryStore;
        use fitlab::models::HistoryEntry;

        let store = HistoryStore::open_in_memory().unwrap();
        store
            .insert(&HistoryEntry {
                id: 100,
                person_preview: "old-person.jpg".to_string(),
                garment_preview: "old-tee.jpg".to_string(),
                result_filename: "old.png".to_string(),
                result_url: "https://api.test/results/image/old.png".to_string(),
                created_at: "2026-02-01T10:00:00Z".to_string(),
            })
            .unwrap();

        let backend = Arc::new(FakeBackend::new());
        let studio =
            Studio::new(backend.clone(), SessionStore::in_memory()).with_history_store(store);
        assert_eq!(studio.history().len(), 1);

        studio
            .login_with_token("tok-test".to_string())
            .await
            .unwrap();
        upload_both(&studio).await;
        studio.generate().await.unwrap();

        // The fresh entry lands in front of the restored one
        let entries = studio.history().entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].result_filename, "r1.png");
        assert_eq!(entries[1].result_filename, "old.png");
        assert!(entries[0].id > entries[1].id);
    }

    #[tokio::test]
    async fn test_login_from_callback_strips_the_token_fragment() {
        let backend = Arc::new(FakeBackend::new());
        let studio = Studio::new(backend.clone(), SessionStore::in_memory());

        let (profile, stripped) = studio
            .login_from_callback("http://localhost:5173/#token=tok123")
            .await
            .unwrap();

        assert_eq!(profile.id, 9);
        assert_eq!(stripped, "http://localhost:5173/");
        assert!(studio.session().is_logged_in());
        assert_eq!(studio.session().credits(), 12);
    }

    #[tokio::test]
    async fn test_login_rejects_a_callback_without_a_token() {
        let backend = Arc::new(FakeBackend::new());
        let studio = Studio::new(backend.clone(), SessionStore::in_memory());

        let outcome = studio
            .login_from_callback("http://localhost:5173/#state=abc")
            .await;
        assert!(matches!(outcome, Err(AuthError::MissingCallbackToken)));
        assert_eq!(backend.profile_calls.load(Ordering::SeqCst), 0);
        assert!(!studio.session().is_logged_in());
    }

    #[tokio::test]
    async fn test_login_rejects_a_profile_without_identity() {
        let mut backend = FakeBackend::new();
        backend.profile = UserProfile {
            id: 9,
            email: None,
            username: None,
            name: None,
            profile_image_url: None,
            credits: None,
        };
        let backend = Arc::new(backend);
        let studio = Studio::new(backend, SessionStore::in_memory());

        let outcome = studio.login_with_token("tok-test".to_string()).await;
        assert!(matches!(outcome, Err(AuthError::MalformedProfile)));
        assert!(!studio.session().is_logged_in());
    }
}
