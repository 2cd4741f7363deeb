use log::{error, info};
use mongodb::{Client, Database};
use rocket::fairing::AdHoc;
use std::sync::Arc;

use crate::config::Config;
use crate::services::email::Notifier;
use crate::services::gateway::PaymentGateway;
use crate::services::{
    AuthService, EmailService, ExpirySweeper, JwtService, OrderLedger, Payments, PhonePeService,
    PlanCatalog, QuotaGate, RazorpayService, SubscriptionActivator,
};
use crate::store::mongo::{
    ensure_indexes, MongoAccountStore, MongoJobStore, MongoOrderStore, MongoOtpStore, MongoPlanStore,
};
use crate::store::AccountStore;

pub fn init() -> AdHoc {
    AdHoc::on_ignite("MongoDB", |rocket| async {
        match connect().await {
            Ok(database) => {
                info!("✓ MongoDB connected successfully");
                if let Err(e) = ensure_indexes(&database).await {
                    error!("✗ Failed to create indexes: {}", e);
                }
                let services = Services::build(&database);
                rocket
                    .manage(services.jwt)
                    .manage(services.auth)
                    .manage(services.catalog)
                    .manage(services.payments)
                    .manage(services.quota)
                    .manage(services.sweeper)
            }
            Err(e) => {
                error!("✗ Failed to connect to MongoDB: {}", e);
                rocket
            }
        }
    })
}

async fn connect() -> Result<Database, mongodb::error::Error> {
    let uri = Config::mongodb_uri();
    let client = Client::with_uri_str(&uri).await?;

    // Test connection
    client
        .database("admin")
        .run_command(mongodb::bson::doc! {"ping": 1}, None)
        .await?;

    Ok(client.database(&Config::mongodb_database()))
}

/// Everything the routes reach through managed state.
pub struct Services {
    pub jwt: JwtService,
    pub auth: AuthService,
    pub catalog: PlanCatalog,
    pub payments: Payments,
    pub quota: QuotaGate,
    pub sweeper: ExpirySweeper,
}

impl Services {
    pub fn build(db: &Database) -> Self {
        let accounts: Arc<dyn AccountStore> = Arc::new(MongoAccountStore::new(db));
        let notifier: Arc<dyn Notifier> = Arc::new(EmailService::from_config());
        let razorpay: Arc<dyn PaymentGateway> = Arc::new(RazorpayService::from_config());
        let phonepe: Arc<dyn PaymentGateway> = Arc::new(PhonePeService::from_config());

        let catalog = PlanCatalog::new(Arc::new(MongoPlanStore::new(db)));
        let ledger = OrderLedger::new(Arc::new(MongoOrderStore::new(db)));
        let activator = SubscriptionActivator::new(
            catalog.clone(),
            ledger.clone(),
            accounts.clone(),
            notifier.clone(),
            Config::card_number_max_attempts(),
        );

        let jwt = JwtService::from_config();
        let auth = AuthService::new(
            accounts.clone(),
            Arc::new(MongoOtpStore::new(db)),
            notifier,
            jwt.clone(),
            Config::otp_ttl_secs(),
            Config::free_job_postings(),
        )
        .log_codes(Config::is_development());

        Services {
            jwt,
            auth,
            payments: Payments::new(catalog.clone(), ledger, activator, accounts.clone(), razorpay, phonepe),
            catalog,
            quota: QuotaGate::new(accounts.clone(), Arc::new(MongoJobStore::new(db))),
            sweeper: ExpirySweeper::new(accounts),
        }
    }
}
